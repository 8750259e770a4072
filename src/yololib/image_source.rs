use easyyolo_domain::{to_yolo, yoloerr, ShapeI, YoloResult};
use image::{ImageReader, RgbaImage};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread,
    time::{Duration, Instant},
};
use tracing::{error, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageData {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// An image the host wants to annotate. The name is the key annotations are stored under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub name: String,
    pub source: ImageData,
}
impl ImageDescriptor {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            name,
            source: ImageData::Path(path.to_path_buf()),
        }
    }
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: ImageData::Bytes(bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub im: RgbaImage,
}
impl DecodedImage {
    pub fn new(im: RgbaImage) -> Self {
        Self { im }
    }
    /// natural size of the bitmap
    pub fn shape(&self) -> ShapeI {
        ShapeI::from_im(&self.im)
    }
}

/// Identifies one load request. Later requests have larger tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LoadTicket(pub u64);
impl LoadTicket {
    #[must_use]
    pub fn next(self) -> Self {
        LoadTicket(self.0 + 1)
    }
}

pub type DecodeResult = (LoadTicket, YoloResult<DecodedImage>);

/// Asynchronous decoding. Results are collected by polling, they may arrive in any order.
pub trait ImageSource {
    fn start(&mut self, ticket: LoadTicket, descriptor: &ImageDescriptor);
    fn poll(&mut self) -> Vec<DecodeResult>;
}

pub fn decode(data: &ImageData) -> YoloResult<DecodedImage> {
    let im = match data {
        ImageData::Path(path) => ImageReader::open(path)
            .map_err(to_yolo)?
            .with_guessed_format()
            .map_err(to_yolo)?
            .decode()
            .map_err(|e| yoloerr!("could not decode image {:?}. {:?}", path, e))?,
        ImageData::Bytes(bytes) => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(to_yolo)?
            .decode()
            .map_err(|e| yoloerr!("could not decode image from bytes. {:?}", e))?,
    };
    Ok(DecodedImage::new(im.to_rgba8()))
}

/// Decodes each request on its own thread.
pub struct DecodeWorker {
    tx: Sender<DecodeResult>,
    rx: Receiver<DecodeResult>,
    n_pending: usize,
}
impl Default for DecodeWorker {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            n_pending: 0,
        }
    }
}
impl DecodeWorker {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn n_pending(&self) -> usize {
        self.n_pending
    }
    /// Blocks until at least one result arrived or `timeout` elapsed.
    pub fn poll_blocking(&mut self, timeout: Duration) -> Vec<DecodeResult> {
        let deadline = Instant::now() + timeout;
        let mut results = self.poll();
        while results.is_empty() && self.n_pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(res) => {
                    self.n_pending -= 1;
                    results.push(res);
                    results.extend(self.poll());
                }
                Err(RecvTimeoutError::Timeout) => {
                    error!("no decoded image after {} ms", timeout.as_millis());
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        results
    }
}
impl ImageSource for DecodeWorker {
    fn start(&mut self, ticket: LoadTicket, descriptor: &ImageDescriptor) {
        let tx = self.tx.clone();
        let descriptor = descriptor.clone();
        self.n_pending += 1;
        thread::spawn(move || {
            let res = decode(&descriptor.source);
            if res.is_ok() {
                info!("decoded {} for ticket {}", descriptor.name, ticket.0);
            }
            if let Err(e) = tx.send((ticket, res)) {
                error!("could not send decoded image {}, {e:?}", descriptor.name);
            }
        });
    }
    fn poll(&mut self) -> Vec<DecodeResult> {
        let mut results = vec![];
        loop {
            match self.rx.try_recv() {
                Ok(res) => {
                    self.n_pending = self.n_pending.saturating_sub(1);
                    results.push(res);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        results
    }
}

#[cfg(test)]
fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let im = RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Cursor::new(vec![]);
    im.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[test]
fn test_decode_bytes() {
    let decoded = decode(&ImageData::Bytes(png_bytes(30, 20))).unwrap();
    assert_eq!(decoded.shape(), ShapeI::new(30, 20));
    assert!(decode(&ImageData::Bytes(vec![1, 2, 3])).is_err());
    assert!(decode(&ImageData::Path(PathBuf::from("/no/such/image.png"))).is_err());
}

#[test]
fn test_worker() {
    let mut worker = DecodeWorker::new();
    let t1 = LoadTicket::default().next();
    let t2 = t1.next();
    worker.start(t1, &ImageDescriptor::from_bytes("a.png", png_bytes(4, 4)));
    worker.start(t2, &ImageDescriptor::from_bytes("b.png", vec![0, 1]));
    let mut results = vec![];
    while results.len() < 2 {
        let new = worker.poll_blocking(Duration::from_secs(10));
        assert!(!new.is_empty());
        results.extend(new);
    }
    results.sort_by_key(|(t, _)| *t);
    assert_eq!(results[0].0, t1);
    assert_eq!(results[0].1.as_ref().unwrap().shape(), ShapeI::new(4, 4));
    assert!(results[1].1.is_err());
    assert_eq!(worker.n_pending(), 0);
}

#[test]
fn test_descriptor_name() {
    let d = ImageDescriptor::from_path("/some/folder/cat.jpg");
    assert_eq!(d.name, "cat.jpg");
    assert_eq!(d.source, ImageData::Path(PathBuf::from("/some/folder/cat.jpg")));
}
