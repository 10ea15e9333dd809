//! Control ports.
//!
//! A [`Port`] guards its value with its own mutex, so control threads and the
//! render thread never need the owning audio's lock to read or write it.
//! Readers take a snapshot and release the lock before doing any work.

use crate::parameter::ParameterRange;
use crate::{Error, Result};
use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Typed port value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    FloatArray(Vec<f32>),
}

impl PortValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PortValue::Bool(_) => "bool",
            PortValue::Int(_) => "int",
            PortValue::UInt(_) => "uint",
            PortValue::Float(_) => "float",
            PortValue::Double(_) => "double",
            PortValue::FloatArray(_) => "float array",
        }
    }

    fn same_type(&self, other: &PortValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Scalar view. Arrays yield their first element, empty arrays zero.
    pub fn as_f64(&self) -> f64 {
        match self {
            PortValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            PortValue::Int(v) => *v as f64,
            PortValue::UInt(v) => *v as f64,
            PortValue::Float(v) => *v as f64,
            PortValue::Double(v) => *v,
            PortValue::FloatArray(v) => v.first().copied().unwrap_or(0.0) as f64,
        }
    }

    /// Same type as `self` carrying `value`.
    ///
    /// Booleans are `value != 0`, integers take the floor (unsigned saturates
    /// at zero), floats pass through. Arrays are filled with `value`.
    pub fn converted(&self, value: f64) -> PortValue {
        match self {
            PortValue::Bool(_) => PortValue::Bool(value != 0.0),
            PortValue::Int(_) => PortValue::Int(value.floor() as i64),
            PortValue::UInt(_) => PortValue::UInt(value.floor().max(0.0) as u64),
            PortValue::Float(_) => PortValue::Float(value as f32),
            PortValue::Double(_) => PortValue::Double(value),
            PortValue::FloatArray(v) => PortValue::FloatArray(vec![value as f32; v.len()]),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortFlags: u32 {
        /// Written by the effect, read by the host.
        const IS_OUTPUT = 1;
        /// Driven by an automation lane.
        const IS_AUTOMATED = 1 << 1;
        /// Value changes are forwarded to the effect's pending ring.
        const FORWARD_TO_PLUGIN = 1 << 2;
    }
}

/// Named control value of a recall.
#[derive(Debug)]
pub struct Port {
    specifier: String,
    plugin_port_index: Option<u32>,
    range: ParameterRange,
    flags: Mutex<PortFlags>,
    value: Mutex<PortValue>,
}

impl Port {
    pub fn new(specifier: impl Into<String>, value: PortValue, range: ParameterRange) -> Self {
        Self {
            specifier: specifier.into(),
            plugin_port_index: None,
            range,
            flags: Mutex::new(PortFlags::empty()),
            value: Mutex::new(value),
        }
    }

    /// Double port starting at the range default.
    pub fn double(specifier: impl Into<String>, range: ParameterRange) -> Self {
        Self::new(specifier, PortValue::Double(range.default), range)
    }

    /// Port mirroring parameter `index` of an external plugin.
    pub fn for_plugin(mut self, index: u32) -> Self {
        self.plugin_port_index = Some(index);
        self.flags.get_mut().insert(PortFlags::FORWARD_TO_PLUGIN);
        self
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn plugin_port_index(&self) -> Option<u32> {
        self.plugin_port_index
    }

    pub fn range(&self) -> &ParameterRange {
        &self.range
    }

    pub fn flags(&self) -> PortFlags {
        *self.flags.lock()
    }

    pub fn set_flags(&self, flags: PortFlags) {
        self.flags.lock().insert(flags);
    }

    pub fn unset_flags(&self, flags: PortFlags) {
        self.flags.lock().remove(flags);
    }

    /// Snapshot of the current value.
    pub fn safe_read(&self) -> PortValue {
        self.value.lock().clone()
    }

    pub fn read_f64(&self) -> f64 {
        self.value.lock().as_f64()
    }

    /// Replace the value. The type must match the port's.
    pub fn safe_write(&self, value: PortValue) -> Result<()> {
        let mut current = self.value.lock();
        if !current.same_type(&value) {
            return Err(Error::PortType {
                specifier: self.specifier.clone(),
                expected: current.type_name(),
                got: value.type_name(),
            });
        }
        *current = value;
        Ok(())
    }

    /// Write a native scalar, converted to the port's type.
    pub fn write_f64(&self, value: f64) -> PortValue {
        let mut current = self.value.lock();
        *current = current.converted(value);
        current.clone()
    }

    /// Write a normalized `[0.0, 1.0]` value. Returns the stored value.
    pub fn write_normalized(&self, normalized: f64) -> PortValue {
        self.write_f64(self.range.denormalize(normalized))
    }

    /// Current value in `[0.0, 1.0]`.
    pub fn read_normalized(&self) -> f64 {
        self.range.normalize(self.read_f64())
    }
}

/// Audio channel a port write applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioChannelTarget {
    All,
    Channel(usize),
}

impl AudioChannelTarget {
    /// Decode the wire form, where `-1` means every channel.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -1 => Some(AudioChannelTarget::All),
            n if n >= 0 => Some(AudioChannelTarget::Channel(n as usize)),
            _ => None,
        }
    }

    pub fn matches(self, audio_channel: usize) -> bool {
        match self {
            AudioChannelTarget::All => true,
            AudioChannelTarget::Channel(n) => n == audio_channel,
        }
    }
}

/// One requested port change.
#[derive(Debug, Clone, PartialEq)]
pub struct PortWrite {
    pub specifier: String,
    pub value: PortValue,
    pub target: AudioChannelTarget,
}

impl PortWrite {
    pub fn new(specifier: impl Into<String>, value: PortValue, target: AudioChannelTarget) -> Self {
        Self {
            specifier: specifier.into(),
            value,
            target,
        }
    }
}
