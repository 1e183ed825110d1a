//! Physical layout: shop-floor zones and the monitored cells inside them

mod cell;
mod zone;

pub use cell::{Cell, CellId, ReaderCode};
pub use zone::{Zone, ZoneId};
