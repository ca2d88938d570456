// src/types.rs
use ndarray::Array2;

// 显示模式
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, serde::Deserialize, serde::Serialize)]
pub enum DisplayMode {
    #[default]
    Raw,
    Fft,
    FftLogF,
    Integrated,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 4] = [
        DisplayMode::Raw,
        DisplayMode::Fft,
        DisplayMode::FftLogF,
        DisplayMode::Integrated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DisplayMode::Raw => "Raw Signal",
            DisplayMode::Fft => "FFT",
            DisplayMode::FftLogF => "FFT (log f)",
            DisplayMode::Integrated => "Integrated",
        }
    }
}

// 采集线程发给消费者的消息
#[derive(Clone, Debug)]
pub enum MonitorMessage {
    Connected,
    Data(Array2<f64>), // 已换算为 µm 的窗口 (samples x 2)
    Disconnected(String),
}
