//! Typed access to the untyped annotation map.
//!
//! - [`AnnotationKey`] and the canonical key constants
//! - [`AnnotationDescriptor`] parse/format pairs with an absent / invalid / valid
//!   three-way read result
//! - [`decode_registered`] static registry for the canonical keys
//!
//! ```ignore
//! let online = AnnotationDescriptor::boolean(PLAYER_ONLINE);
//! online.set(&mut metadata, &true)?;
//! assert_eq!(online.get(&metadata)?, Some(true));
//! ```
mod canonical;
mod descriptor;
mod keys;
mod registry;

pub use canonical::*;
pub use descriptor::*;
pub use keys::*;
pub use registry::*;
