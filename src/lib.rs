//! Real-time audio output for an articulatory speech synthesizer.
//!
//! A control thread (UI or batch driver) produces vocal-tract parameter
//! frames; the audio thread renders them into PCM samples through a
//! vocal-tract model and hands them to the device callback under hard
//! real-time constraints. The two threads meet only at a pair of lock-free
//! SPSC rings: parameters one way, metering the other.
//!
//! # Primary API
//!
//! - [`AudioSession`]: live path — start/stop, [`push_frame`](AudioSession::push_frame),
//!   [`poll_analysis`](AudioSession::poll_analysis)
//! - [`BufferedPlayer`]: offline path — render into a buffer, then audition it
//! - [`VocalTractModel`]: the seam to the synthesis engine
//! - [`DeviceBackend`] / [`DeviceClient`]: the seam to the platform audio
//!   service ([`CpalBackend`] in production, [`device::testing::FakeBackend`]
//!   in tests)
//!
//! # Example
//!
//! ```ignore
//! use artic_audio::{AudioSession, CpalBackend, SynthConfig};
//!
//! let config = SynthConfig::load("voice.toml")?;
//! let mut session = AudioSession::new(
//!     config,
//!     Box::new(CpalBackend::new()),
//!     Box::new(|config, sample_rate| Ok(build_model(config, sample_rate))),
//! )?;
//! session.start()?;
//! while let Some(frame) = trajectory.next() {
//!     if !session.push_frame(&frame) {
//!         // ring full: slow down or accept the drop
//!     }
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod ring;
pub use ring::{spsc_ring, RingConsumer, RingProducer};

pub mod smooth;
pub use smooth::MovingAverageFilter;

pub mod model;
pub use model::VocalTractModel;

pub mod analysis;
pub use analysis::{AnalysisFrame, AnalysisMonitor, AtomicPeak};

pub mod config;
pub use config::{ParameterSpec, SynthConfig};

pub mod device;
pub use device::{CpalBackend, CpalClient, DeviceBackend, DeviceClient, ProcessFn, ShutdownFn};

pub mod processor;
pub use processor::{RenderProcessor, MAX_OUTPUT_LEVEL};

pub mod session;
pub use session::{AudioSession, ModelFactory, ANALYSIS_RING_FRAMES, PARAMETER_RING_FRAMES};

pub mod player;
pub use player::{BufferedPlayer, PlaybackHandle};
