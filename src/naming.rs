//! Output filename resolution.
//!
//! With hashing on, the stem is replaced by the lowercase hex SHA-256 of its
//! bytes and the suffix is kept as written:
//!
//! - `photo.HEIC` → `55c64d0f…1c7804e8.HEIC`
//! - `IMG_0001.jpg` → `<sha256("IMG_0001")>.jpg`
//!
//! With hashing off the file name is carried over unchanged. Either way the
//! result depends only on the input path, the output directory and the
//! policy.

use crate::config::NamingPolicy;
use sha2::{Digest, Sha256};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Lowercase hex SHA-256 of the stem's raw bytes.
pub fn hash_stem(stem: &OsStr) -> String {
    format!("{:x}", Sha256::digest(stem.as_encoded_bytes()))
}

/// Destination of `input` inside `output_dir`.
pub fn resolve_output_path(input: &Path, output_dir: &Path, policy: NamingPolicy) -> PathBuf {
    let file_name = match policy {
        NamingPolicy::Original => input.file_name().unwrap_or(input.as_os_str()).to_os_string(),
        NamingPolicy::Hashed => {
            let stem = input.file_stem().unwrap_or_default();
            let mut name = OsString::from(hash_stem(stem));
            if let Some(ext) = input.extension() {
                name.push(".");
                name.push(ext);
            }
            name
        }
    };
    output_dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHOTO_SHA256: &str = "55c64d0fcd6f9d5f7c828093857e3fdfda68478bb4e9bd24d481ef391c7804e8";

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let digest = hash_stem(OsStr::new("photo"));
        assert_eq!(digest, PHOTO_SHA256);
        assert_eq!(
            hash_stem(OsStr::new("")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hashed_name_keeps_suffix_case() {
        let out = resolve_output_path(
            Path::new("/in/photo.HEIC"),
            Path::new("/out"),
            NamingPolicy::Hashed,
        );
        assert_eq!(
            out,
            Path::new("/out").join(format!("{PHOTO_SHA256}.HEIC"))
        );
    }

    #[test]
    fn only_the_stem_is_hashed() {
        let jpg = resolve_output_path(Path::new("/in/a.jpg"), Path::new("/out"), NamingPolicy::Hashed);
        let png = resolve_output_path(Path::new("/in/a.png"), Path::new("/out"), NamingPolicy::Hashed);
        assert_eq!(jpg.file_stem(), png.file_stem());
        assert_ne!(jpg, png);
    }

    #[test]
    fn input_directory_does_not_affect_name() {
        let a = resolve_output_path(Path::new("/x/a.jpg"), Path::new("/out"), NamingPolicy::Hashed);
        let b = resolve_output_path(Path::new("/y/a.jpg"), Path::new("/out"), NamingPolicy::Hashed);
        assert_eq!(a, b);
    }

    #[test]
    fn resolution_is_deterministic() {
        for policy in [NamingPolicy::Hashed, NamingPolicy::Original] {
            let first = resolve_output_path(Path::new("/in/p.jpg"), Path::new("/out"), policy);
            let second = resolve_output_path(Path::new("/in/p.jpg"), Path::new("/out"), policy);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn original_policy_keeps_file_name() {
        let out = resolve_output_path(
            Path::new("/in/My Photo.jpeg"),
            Path::new("/out"),
            NamingPolicy::Original,
        );
        assert_eq!(out, Path::new("/out/My Photo.jpeg"));
    }

    #[test]
    fn hashed_name_without_suffix() {
        let out = resolve_output_path(Path::new("/in/raw"), Path::new("/out"), NamingPolicy::Hashed);
        assert_eq!(out, Path::new("/out").join(hash_stem(OsStr::new("raw"))));
    }

    #[test]
    fn different_stems_hash_differently() {
        assert_ne!(hash_stem(OsStr::new("photo")), hash_stem(OsStr::new("photo2")));
    }
}
