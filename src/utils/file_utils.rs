use std::path::{Path, PathBuf};

use crate::shared::constants;
use crate::shared::error::{Result, SlideError};

/// List image files in a directory, sorted by path.
///
/// Sorting by name gives capture order for our own `slide_<n>.jpg` output
/// (and alphabetical order for anything else). An empty directory is fine.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| SlideError::io(dir, format!("failed to read directory: {}", e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().map_or(false, |ext| {
                    constants::IMAGE_EXTENSIONS
                        .iter()
                        .any(|e| ext.eq_ignore_ascii_case(e))
                })
        })
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, File};

    #[test]
    fn test_list_images_sorted_and_filtered() {
        let tmp_dir = std::env::temp_dir().join("slidegrab_test_list_images");
        create_dir_all(&tmp_dir).unwrap();
        for name in ["slide_2.jpg", "slide_0.jpg", "slide_1.jpg", "notes.txt"] {
            File::create(tmp_dir.join(name)).unwrap();
        }

        let files = list_images(&tmp_dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["slide_0.jpg", "slide_1.jpg", "slide_2.jpg"]);

        let _ = std::fs::remove_dir_all(&tmp_dir);
    }

    #[test]
    fn test_list_images_missing_dir_is_io_error() {
        let missing = std::env::temp_dir().join("slidegrab_no_such_dir_42");
        assert!(matches!(
            list_images(&missing),
            Err(SlideError::Io { .. })
        ));
    }
}
