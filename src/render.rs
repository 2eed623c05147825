//! # Rendering Collaborator
//!
//! Printing HTML needs something that lays it out into pixels. That engine
//! lives outside this crate; it plugs in through [`Renderer`].

use crate::bitmap::Bitmap;
use crate::error::Result;

/// Turns an HTML document into a bitmap `width` dots wide.
///
/// Failures should be reported as [`PrintError::Render`](crate::PrintError::Render).
pub trait Renderer {
    fn render(&self, html: &str, width: u32) -> Result<Bitmap>;
}

impl<F> Renderer for F
where
    F: Fn(&str, u32) -> Result<Bitmap>,
{
    fn render(&self, html: &str, width: u32) -> Result<Bitmap> {
        self(html, width)
    }
}
