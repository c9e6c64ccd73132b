use std::fs;
use std::io;
use std::path::Path;

/// Upper bound on counters tried before giving up on a directory.
const MAX_COUNTERS: u32 = 100_000;

/// Returns `candidate` if unused in `directory`, otherwise the first free
/// `stem(N).ext` for N = 1, 2, ...
///
/// Candidates never exceed `max_name_bytes`: the stem is shortened, on a char
/// boundary, to make room for the counter. Every candidate hits the filesystem;
/// no listing is cached between attempts.
pub fn make_unique(directory: &Path, candidate: &str, max_name_bytes: usize) -> io::Result<String> {
    if !entry_exists(&directory.join(candidate))? {
        return Ok(candidate.to_string());
    }

    let (stem, extension) = split_name(candidate);
    for counter in 1..=MAX_COUNTERS {
        let suffix = format!("({}){}", counter, extension);
        let stem = truncate_to(stem, max_name_bytes.saturating_sub(suffix.len()));
        if stem.is_empty() {
            break;
        }
        let numbered = format!("{}{}", stem, suffix);
        if !entry_exists(&directory.join(&numbered))? {
            return Ok(numbered);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free name for '{}' in {} after {} attempts",
            candidate,
            directory.display(),
            MAX_COUNTERS
        ),
    ))
}

/// Moves `from` to `to` only if nothing exists at `to`.
///
/// Links the new name first and then drops the old one, so an entry created
/// at `to` by another process yields `AlreadyExists` instead of being
/// replaced. Filesystems without hard links fall back to a checked rename.
pub fn rename_noclobber(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => fs::remove_file(from).or_else(|err| {
            // Keep exactly one name for the file.
            let _ = fs::remove_file(to);
            Err(err)
        }),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(err),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(err),
        Err(_) => {
            if entry_exists(to)? {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", to.display()),
                ));
            }
            fs::rename(from, to)
        }
    }
}

fn truncate_to(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    &value[..cut]
}

/// Splits at the last period, keeping it with the extension. A leading period
/// (dotfile) is part of the stem.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Existence without following symlinks, so dangling links still occupy a name.
fn entry_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_free_name_returned_unchanged() {
        let dir = tempdir().unwrap();
        assert_eq!(make_unique(dir.path(), "A.csv", 255).unwrap(), "A.csv");
    }

    #[test]
    fn test_skips_existing_counters() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.csv"), "a").unwrap();
        fs::write(dir.path().join("A(1).csv"), "a1").unwrap();
        assert_eq!(make_unique(dir.path(), "A.csv", 255).unwrap(), "A(2).csv");
    }

    #[test]
    fn test_gap_in_counters_is_reused() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.csv"), "a").unwrap();
        fs::write(dir.path().join("A(2).csv"), "a2").unwrap();
        assert_eq!(make_unique(dir.path(), "A.csv", 255).unwrap(), "A(1).csv");
    }

    #[test]
    fn test_name_without_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README"), "r").unwrap();
        assert_eq!(make_unique(dir.path(), "README", 255).unwrap(), "README(1)");
    }

    #[test]
    fn test_counter_fits_name_limit() {
        let dir = tempdir().unwrap();
        let candidate = format!("{}.docx", "a".repeat(250));
        assert_eq!(candidate.len(), 255);
        fs::write(dir.path().join(&candidate), "taken").unwrap();

        let unique = make_unique(dir.path(), &candidate, 255).unwrap();
        assert_eq!(unique, format!("{}(1).docx", "a".repeat(247)));
        fs::write(dir.path().join(&unique), "taken too").unwrap();

        let next = make_unique(dir.path(), &candidate, 255).unwrap();
        assert!(next.len() <= 255);
        assert!(next.ends_with("(2).docx"));
    }

    #[test]
    fn test_counter_cut_respects_char_boundary() {
        let dir = tempdir().unwrap();
        // 'é' is two bytes; a cut in the middle of it must back off.
        let candidate = format!("{}.txt", "é".repeat(10));
        fs::write(dir.path().join(&candidate), "taken").unwrap();
        let unique = make_unique(dir.path(), &candidate, 20).unwrap();
        assert_eq!(unique, format!("{}(1).txt", "é".repeat(6)));
    }

    #[test]
    fn test_rename_noclobber_moves_file() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("from.txt");
        let to = dir.path().join("to.txt");
        fs::write(&from, "payload").unwrap();

        rename_noclobber(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "payload");
    }

    #[test]
    fn test_rename_noclobber_keeps_existing_target() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("from.txt");
        let to = dir.path().join("to.txt");
        fs::write(&from, "mine").unwrap();
        fs::write(&to, "theirs").unwrap();

        let err = rename_noclobber(&from, &to).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&from).unwrap(), "mine");
        assert_eq!(fs::read_to_string(&to).unwrap(), "theirs");
    }

    #[test]
    fn test_rename_noclobber_missing_source() {
        let dir = tempdir().unwrap();
        let err = rename_noclobber(&dir.path().join("gone.txt"), &dir.path().join("new.txt"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("A.csv"), ("A", ".csv"));
        assert_eq!(split_name("Jane Doe - v1.0 notes.docx"), ("Jane Doe - v1.0 notes", ".docx"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name(".env"), (".env", ""));
        assert_eq!(split_name("plain"), ("plain", ""));
    }
}
