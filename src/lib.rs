//! Download the photo albums of the LIAZ Dakar gallery.
//!
//! Every configured album page is scanned for `img` elements whose `longdesc`
//! attribute carries the full image address; each image is fetched in full
//! resolution into `<output_directory>/<album_prefix><album>/`, skipping files
//! that are already on disk.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod parse;
pub mod request;
