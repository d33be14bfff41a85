pub mod http;
pub mod media;
pub mod onnx;
pub mod v4l2;
