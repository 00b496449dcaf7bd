//! # Events Module
//!
//! Progress reporting for indexing runs.
//!
//! ## Design
//! The pipeline emits events through channels, so the CLI (or any other
//! caller) can subscribe and display progress without the core knowing
//! how it is shown.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Enumerate(EnumerateEvent::JobFound { job_number, images }) => {
//!                 println!("job {job_number}: {images} images")
//!             }
//!             Event::Hash(HashEvent::Progress(p)) => println!("{}/{}", p.completed, p.submitted),
//!             _ => {}
//!         }
//!     }
//! });
//!
//! IndexRun::new(&config, &store).execute(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
