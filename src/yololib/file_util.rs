use easyyolo_domain::{yoloerr, YoloResult};
use lazy_static::lazy_static;
use std::{
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{error, info};

lazy_static! {
    pub static ref DEFAULT_TMPDIR: PathBuf = std::env::temp_dir().join("easyyolo");
}
lazy_static! {
    pub static ref DEFAULT_HOMEDIR: PathBuf = match dirs::home_dir() {
        Some(p) => p.join(".easyyolo"),
        _ => std::env::temp_dir().join("easyyolo"),
    };
}
lazy_static! {
    pub static ref DEFAULT_STORE_DIR: PathBuf = DEFAULT_HOMEDIR.join("store");
}

pub fn read_to_string<P>(p: P) -> YoloResult<String>
where
    P: AsRef<Path> + Debug,
{
    fs::read_to_string(&p).map_err(|e| yoloerr!("could not read {:?} due to {:?}", p, e))
}

pub fn write<P, C>(path: P, contents: C) -> YoloResult<()>
where
    P: AsRef<Path> + Debug,
    C: AsRef<[u8]>,
{
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| yoloerr!("could not create folder {:?} due to {:?}", parent, e))?;
        }
    }
    fs::write(&path, contents).map_err(|e| yoloerr!("could not write to {:?} since {:?}", path, e))
}

pub struct Defer<F: FnMut()> {
    pub func: F,
}
impl<F: FnMut()> Drop for Defer<F> {
    fn drop(&mut self) {
        (self.func)();
    }
}
#[macro_export]
macro_rules! defer {
    ($f:expr) => {
        let _dfr = $crate::file_util::Defer { func: $f };
    };
}
pub fn checked_remove<'a, P: AsRef<Path> + Debug>(
    path: &'a P,
    func: fn(p: &'a P) -> io::Result<()>,
) {
    match func(path) {
        Ok(_) => info!("removed {path:?}"),
        Err(e) => error!("could not remove {path:?} due to {e:?}"),
    }
}
#[macro_export]
macro_rules! defer_folder_removal {
    ($path:expr) => {
        let func = || $crate::file_util::checked_remove($path, std::fs::remove_dir_all);
        $crate::defer!(func);
    };
}

/// Storage keys end up as file names, hence everything but a conservative set of characters is
/// replaced.
pub fn key_to_filename(key: &str) -> String {
    let stem = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    format!("{stem}.json")
}

#[test]
fn test_write_read() {
    let folder = DEFAULT_TMPDIR.join("file_util_test_write_read");
    defer_folder_removal!(&folder);
    let file = folder.join("nested").join("x.txt");
    write(&file, "hello").unwrap();
    assert_eq!(read_to_string(&file).unwrap(), "hello");
    assert!(read_to_string(folder.join("missing.txt")).is_err());
}

#[test]
fn test_key_to_filename() {
    assert_eq!(key_to_filename("easyYoloAnnotations"), "easyYoloAnnotations.json");
    assert_eq!(key_to_filename("a/b c"), "a_b_c.json");
}
