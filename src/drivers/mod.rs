// src/drivers/mod.rs
// 声明同级目录下的子模块文件
pub mod acquisition;
pub mod buffer;
pub mod condense;
pub mod error;
pub mod fft;
pub mod integrated;
pub mod log_spectrum;
pub mod mask;
pub mod protocol;
pub mod raw;
pub mod spectrum;
pub mod transform;
// 公开导出这些模块里的结构体，方便外部调用
pub use acquisition::{AcquisitionConfig, AcquisitionLoop, AcquisitionSink, LoopState};
pub use buffer::{Sample, SampleBuffer, SharedBuffer};
pub use error::FaError;
pub use fft::SpectrumBuilder;
pub use mask::SubscriptionMask;
pub use protocol::{sample_frequency, ProtocolClient, SampleBlock};
pub use transform::{AxisInfo, AxisScale, Axes, Trace, Transform};
