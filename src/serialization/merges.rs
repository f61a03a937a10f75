//! Plain-text `merges.txt` export.
//!
//! One merge per line as `<left> <right>`, with the end-of-word marker removed from both
//! sides. The listing is for humans and is never read back.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{DbpeError, Result};
use crate::model::{Pair, END_OF_WORD};

/// Renders the merge table as the plain-text listing.
#[must_use]
pub fn merges_listing(merges: &[Pair]) -> String {
    let mut out = String::new();
    for (left, right) in merges {
        out.push_str(&left.replace(END_OF_WORD, ""));
        out.push(' ');
        out.push_str(&right.replace(END_OF_WORD, ""));
        out.push('\n');
    }
    out
}

/// Streams the plain-text listing into `writer`.
pub fn write_merges_txt<W: Write>(merges: &[Pair], writer: &mut W) -> std::io::Result<()> {
    for (left, right) in merges {
        writeln!(
            writer,
            "{} {}",
            left.replace(END_OF_WORD, ""),
            right.replace(END_OF_WORD, "")
        )?;
    }
    Ok(())
}

/// Writes the plain-text listing to `path`.
pub fn save_merges_txt<P: AsRef<Path>>(merges: &[Pair], path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| DbpeError::io(err, Some(path.to_path_buf())))?;
    let mut writer = BufWriter::new(file);
    write_merges_txt(merges, &mut writer)
        .and_then(|()| writer.flush())
        .map_err(|err| DbpeError::io(err, Some(path.to_path_buf())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn merges() -> Vec<Pair> {
        vec![
            ("l".into(), "o".into()),
            ("w".into(), "</w>".into()),
            ("lo".into(), "w</w>".into()),
        ]
    }

    #[test]
    fn listing_strips_marker_from_both_sides() {
        assert_eq!(merges_listing(&merges()), "l o\nw \nlo w\n");
    }

    #[test]
    fn writer_and_listing_agree() {
        let mut buffer = Vec::new();
        write_merges_txt(&merges(), &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), merges_listing(&merges()));
    }

    #[test]
    fn saves_listing_to_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("merges.txt");
        save_merges_txt(&merges(), &path).expect("save");
        assert_eq!(fs::read_to_string(&path).unwrap(), "l o\nw \nlo w\n");
    }

    #[test]
    fn empty_table_writes_empty_file() {
        assert_eq!(merges_listing(&[]), "");
    }
}
