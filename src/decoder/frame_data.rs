use opencv::core::Mat;

/// One decoded video frame: the BGR `Mat` as OpenCV produced it plus an
/// owned row-major grayscale copy, tagged with its sequential index.
///
/// Read-only after creation. The grayscale plane is copied out of the Mat so
/// every similarity metric can run on a plain byte slice.
pub struct Frame {
    pub index: u64,
    pub color: Mat,
    pub gray: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
