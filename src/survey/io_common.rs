use std::path::{Path, PathBuf};

pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Rounds to two decimals, the precision of the published averages.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The submission time, local time with a precision of one second.
pub fn now_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(
            resolve_path(Path::new("/srv"), "a.csv"),
            PathBuf::from("/srv/a.csv")
        );
        assert_eq!(
            resolve_path(Path::new("/srv"), "/tmp/a.csv"),
            PathBuf::from("/tmp/a.csv")
        );
        assert_eq!(resolve_path(Path::new(""), "a.csv"), PathBuf::from("a.csv"));
        assert_eq!(simplify_file_name(Path::new("/srv/data/a.csv")), "a.csv");
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(4.0), 4.0);
        assert_eq!(round2(3.456), 3.46);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }

    #[test]
    fn timestamp_format() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), "2024-05-02T10:00:00".len());
        assert_eq!(&ts[10..11], "T");
    }
}
