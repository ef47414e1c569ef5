// Device module - DDP frame output to a WLED controller

use anyhow::{anyhow, Result};
use ddp_rs::connection::DDPConnection;
use ddp_rs::protocol::{PixelConfig, ID};
use std::net::UdpSocket;

/// Sink for rendered frames. The render loop and the engine's blocking
/// utilities push frames here; tests substitute a capturing sink.
pub trait FrameSink {
    fn send_frame(&mut self, frame: &[u8], brightness: f32) -> Result<()>;
}

/// Scale a frame by a global brightness factor (0.0-1.0).
pub fn scale_frame(frame: &[u8], brightness: f32) -> Vec<u8> {
    let factor = brightness.clamp(0.0, 1.0);
    frame.iter().map(|&c| (c as f32 * factor) as u8).collect()
}

/// DDP connection to a single WLED device (UDP port 4048).
pub struct DdpSink {
    connection: DDPConnection,
}

impl DdpSink {
    pub fn connect(address: &str) -> Result<Self> {
        let dest_addr = format!("{}:4048", address);
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let connection =
            DDPConnection::try_new(&dest_addr, PixelConfig::default(), ID::Default, socket)
                .map_err(|e| anyhow!("Failed to open DDP connection to {}: {}", dest_addr, e))?;
        Ok(DdpSink { connection })
    }
}

impl FrameSink for DdpSink {
    fn send_frame(&mut self, frame: &[u8], brightness: f32) -> Result<()> {
        let scaled = scale_frame(frame, brightness);
        self.connection
            .write(&scaled)
            .map_err(|e| anyhow!("DDP write failed: {}", e))?;
        Ok(())
    }
}

/// Test sink that records every frame it is handed (post brightness scaling).
#[cfg(test)]
pub struct CaptureSink {
    pub frames: Vec<Vec<u8>>,
}

#[cfg(test)]
impl CaptureSink {
    pub fn new() -> Self {
        CaptureSink { frames: Vec::new() }
    }
}

#[cfg(test)]
impl FrameSink for CaptureSink {
    fn send_frame(&mut self, frame: &[u8], brightness: f32) -> Result<()> {
        self.frames.push(scale_frame(frame, brightness));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_frame_half() {
        let frame = vec![200u8, 100, 0];
        assert_eq!(scale_frame(&frame, 0.5), vec![100, 50, 0]);
    }

    #[test]
    fn test_scale_frame_clamps_factor() {
        let frame = vec![100u8];
        assert_eq!(scale_frame(&frame, 2.0), vec![100]);
        assert_eq!(scale_frame(&frame, -1.0), vec![0]);
    }

    #[test]
    fn test_capture_sink_applies_brightness() {
        let mut sink = CaptureSink::new();
        sink.send_frame(&[255, 255, 255], 0.0).unwrap();
        assert_eq!(sink.frames[0], vec![0, 0, 0]);
    }
}
