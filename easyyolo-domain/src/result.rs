use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
};

/// Error of everything that can go wrong while editing, storing or importing annotations.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct YoloError {
    msg: String,
}
impl YoloError {
    pub fn new(msg: &str) -> YoloError {
        YoloError {
            msg: msg.to_string(),
        }
    }
    pub fn msg(&self) -> &str {
        &self.msg
    }
}
impl Display for YoloError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}
impl Error for YoloError {}
impl From<&str> for YoloError {
    fn from(value: &str) -> Self {
        YoloError::new(value)
    }
}

/// Result type with [`YoloError`](YoloError) as error type.
pub type YoloResult<U> = Result<U, YoloError>;

/// Creates a [`YoloError`](YoloError) with a formatted message.
/// ```rust
/// use easyyolo_domain::{yoloerr, YoloError};
/// assert_eq!(yoloerr!("some error {}", 1), YoloError::new("some error 1"));
/// ```
#[macro_export]
macro_rules! yoloerr {
    ($s:literal) => {
        $crate::YoloError::new(format!($s).as_str())
    };
    ($s:literal, $( $exps:expr ),*) => {
        $crate::YoloError::new(format!($s, $($exps,)*).as_str())
    }
}

pub fn to_yolo<E: Debug>(e: E) -> YoloError {
    yoloerr!(
        "original error type is '{:?}', error message is '{:?}'",
        std::any::type_name::<E>(),
        e
    )
}

#[test]
fn test_to_yolo() {
    let e = "abc".parse::<u32>().map_err(to_yolo).unwrap_err();
    assert!(e.msg().contains("ParseIntError"));
    assert_eq!(format!("{}", yoloerr!("x {}", 2)), "x 2");
}
