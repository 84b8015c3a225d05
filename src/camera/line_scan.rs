// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! USB line-scan camera (TCD1304 CCD module)
//!
//! The module speaks a small bulk protocol:
//!
//! * Commands are written to endpoint `0x01` as `[cmd, len, data…]`.
//!   The transfer must report exactly `len + 2` bytes written.
//! * Command responses are read from endpoint `0x81` as `[1, len, data…]`.
//! * A frame is requested with command `0x34` and read from endpoint `0x82`
//!   as 3840 little-endian 16-bit words. Words 16..29 are masked (dark)
//!   pixels, words 32..3680 are the 3648 active pixels and word 3833 echoes
//!   the programmed exposure, which serves as an integrity check.
//!
//! The USB binding itself lives outside this crate behind [`UsbTransport`].

use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};

use super::{Bounds, CameraDescriptor, CameraError, CameraPort, Capabilities, Frame};

pub const COMMAND_ENDPOINT: u8 = 0x01;
pub const RESPONSE_ENDPOINT: u8 = 0x81;
pub const FRAME_ENDPOINT: u8 = 0x82;

const CMD_FIRMWARE: u8 = 0x01;
const CMD_APPLY_EXPOSURE: u8 = 0x30;
const CMD_SET_EXPOSURE: u8 = 0x31;
const CMD_GRAB: u8 = 0x34;
const CMD_IDENTITY: u8 = 0x21;

const FRAME_BYTES: usize = 7680;
const EXPOSURE_ECHO_WORD: usize = 3833;
const DARK_WORDS: std::ops::Range<usize> = 16..29;
const PIXEL_WORDS: std::ops::Range<usize> = 32..3680;
const FULL_SCALE: f64 = 65536.0;
const IDENTITY_BYTES: usize = 43;

pub const PIXEL_COUNT: usize = 3648;
pub const PIXEL_PITCH_UM: f64 = 8.0;
pub const EXPOSURE_BOUNDS: Bounds = Bounds::new(0.1, 1000.0);

/// Bulk transfer access to the camera's USB interface
#[cfg_attr(test, mockall::automock)]
pub trait UsbTransport: Send {
    /// Write `data` to `endpoint`, returning the number of bytes transferred
    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, CameraError>;

    /// Read up to `length` bytes from `endpoint`
    fn read(&mut self, endpoint: u8, length: usize) -> Result<Vec<u8>, CameraError>;
}

/// Identity block reported by the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
    pub date: String,
    pub firmware: String,
}

struct LineScanState {
    transport: Option<Box<dyn UsbTransport>>,
    exposure_ms: f64,
    exposure_word: u16,
    gain: f64,
}

/// Line-scan CCD camera driven over [`UsbTransport`]
pub struct LineScanUsbCamera {
    descriptor: CameraDescriptor,
    state: Mutex<LineScanState>,
}

fn write_command(
    transport: &mut dyn UsbTransport,
    command: u8,
    data: &[u8],
) -> Result<(), CameraError> {
    let mut packet = Vec::with_capacity(data.len() + 2);
    packet.push(command);
    packet.push(data.len() as u8);
    packet.extend_from_slice(data);
    let written = transport.write(COMMAND_ENDPOINT, &packet)?;
    if written != packet.len() {
        return Err(CameraError::Command(format!(
            "command 0x{:02x}: wrote {} of {} bytes",
            command,
            written,
            packet.len()
        )));
    }
    Ok(())
}

fn read_response(transport: &mut dyn UsbTransport, size: usize) -> Result<Vec<u8>, CameraError> {
    let reply = transport.read(RESPONSE_ENDPOINT, size + 2)?;
    if reply.len() < size + 2 || reply[0] != 1 || reply[1] as usize != size {
        return Err(CameraError::Command(format!(
            "malformed {}-byte response",
            reply.len()
        )));
    }
    Ok(reply[2..size + 2].to_vec())
}

fn field(info: &[u8], range: std::ops::Range<usize>) -> String {
    info.get(range)
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .unwrap_or_default()
}

impl LineScanUsbCamera {
    /// Take ownership of an opened transport and program the initial exposure.
    pub fn open(
        transport: Box<dyn UsbTransport>,
        initial_exposure_ms: f64,
    ) -> Result<Self, CameraError> {
        let camera = Self {
            descriptor: CameraDescriptor {
                name: "TCD1304 USB line camera".to_string(),
                pixel_count: PIXEL_COUNT,
                pixel_pitch_um: PIXEL_PITCH_UM,
                exposure_ms: EXPOSURE_BOUNDS,
                // The module has no analog gain stage.
                gain: Bounds::new(0.0, 1000.0),
                capabilities: Capabilities::default(),
            },
            state: Mutex::new(LineScanState {
                transport: Some(transport),
                exposure_ms: 0.0,
                exposure_word: 0,
                gain: 1.0,
            }),
        };
        camera.set_exposure(initial_exposure_ms)?;
        Ok(camera)
    }

    fn lock(&self) -> MutexGuard<'_, LineScanState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn closed(&self) -> CameraError {
        CameraError::Closed(self.descriptor.name.clone())
    }

    /// Query the identity block and firmware version
    pub fn identify(&self) -> Result<DeviceInfo, CameraError> {
        let mut state = self.lock();
        let transport = state.transport.as_deref_mut().ok_or_else(|| self.closed())?;

        write_command(transport, CMD_IDENTITY, &[0])?;
        let info = read_response(transport, IDENTITY_BYTES)?;
        write_command(transport, CMD_FIRMWARE, &[2])?;
        let firmware = read_response(transport, 3)?;

        Ok(DeviceInfo {
            model: field(&info, 1..11),
            serial: field(&info, 15..28),
            date: field(&info, 29..39),
            firmware: firmware
                .iter()
                .map(|part| part.to_string())
                .collect::<Vec<_>>()
                .join("."),
        })
    }
}

impl CameraPort for LineScanUsbCamera {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn get_frame(&self) -> Result<Frame, CameraError> {
        let mut state = self.lock();
        let expected_echo = state.exposure_word;
        let transport = state.transport.as_deref_mut().ok_or_else(|| self.closed())?;

        write_command(transport, CMD_GRAB, &[1])?;
        let data = transport.read(FRAME_ENDPOINT, FRAME_BYTES)?;
        if data.len() < FRAME_BYTES {
            return Err(CameraError::Io(format!(
                "short frame transfer: {} of {} bytes",
                data.len(),
                FRAME_BYTES
            )));
        }

        let words: Vec<u16> = data[..FRAME_BYTES]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if words[EXPOSURE_ECHO_WORD] != expected_echo {
            warn!(
                "Exposure echo {} does not match programmed {}",
                words[EXPOSURE_ECHO_WORD], expected_echo
            );
            return Err(CameraError::Io("exposure echo mismatch".to_string()));
        }

        let dark = words[DARK_WORDS].iter().map(|&w| w as f64).sum::<f64>()
            / DARK_WORDS.len() as f64;
        Ok(Frame::Line(
            words[PIXEL_WORDS]
                .iter()
                .map(|&w| (w as f64 - dark) / FULL_SCALE)
                .collect(),
        ))
    }

    fn set_exposure(&self, exposure_ms: f64) -> Result<f64, CameraError> {
        let mut state = self.lock();
        if state.transport.is_none() {
            return Err(self.closed());
        }
        let applied = EXPOSURE_BOUNDS.clamp(exposure_ms);
        if applied == state.exposure_ms {
            return Ok(applied);
        }
        let transport = state.transport.as_deref_mut().ok_or_else(|| self.closed())?;

        // Tenths of a millisecond, big-endian
        let word = (applied * 10.0) as u16;
        write_command(transport, CMD_SET_EXPOSURE, &word.to_be_bytes())?;
        write_command(transport, CMD_APPLY_EXPOSURE, &[0])?;

        debug!("Line camera exposure set to {} ms", applied);
        state.exposure_ms = applied;
        state.exposure_word = word;
        Ok(applied)
    }

    fn exposure(&self) -> f64 {
        self.lock().exposure_ms
    }

    fn set_gain(&self, gain: f64) -> Result<f64, CameraError> {
        let mut state = self.lock();
        if state.transport.is_none() {
            return Err(self.closed());
        }
        let applied = self.descriptor.gain.clamp(gain);
        state.gain = applied;
        Ok(applied)
    }

    fn gain(&self) -> f64 {
        self.lock().gain
    }

    fn close(&self) -> Result<(), CameraError> {
        if self.lock().transport.take().is_some() {
            debug!("Line camera released");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().transport.is_none()
    }
}
