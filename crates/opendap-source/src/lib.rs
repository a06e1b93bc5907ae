//! OPeNDAP (DAP2) grid source for the precipitation engine.
//!
//! Each monthly dataset is addressed by substituting the period into a URL
//! template. Opening a period fetches its DDS to learn the grid shape, plus
//! the latitude and longitude vectors; every time slice is then read with a
//! constrained ASCII request such as `pr[3:3][0:299][0:399]`.
//!
//! ```text
//! DapSource::open(period)
//!   ├── GET {url}.dds              → shape of pr(time, lat, lon)
//!   └── GET {url}.ascii?lat,lon    → coordinate vectors
//! DapHandle::read_slice(t)
//!   └── GET {url}.ascii?pr[t:t][..][..]
//! ```

pub mod ascii;
pub mod config;
pub mod dds;
pub mod error;
pub mod source;

pub use config::{DapConfig, DEFAULT_URL_TEMPLATE};
pub use error::{DapError, DapResult};
pub use source::{time_axis, DapHandle, DapSource};
