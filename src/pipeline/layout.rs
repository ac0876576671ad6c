//! Page geometry: fit each cleaned image onto a fixed-size page.
//!
//! All arithmetic here is in layout units (A4 millimetres); conversion to
//! PDF points happens once, in [`crate::pipeline::compose`]. Keeping this
//! module free of I/O makes the scaling rules directly testable:
//!
//! * width-first fit — width is pinned to the content rectangle first, and
//!   only if the derived height overflows is the image re-fit to the content
//!   height
//! * the fitted image is centered on the FULL page, not the content
//!   rectangle (the margins merely bound the maximum size)

/// Points per layout unit (PDF points per millimetre).
pub const PT_PER_UNIT: f64 = 72.0 / 25.4;

/// A fixed page size with a uniform margin on each edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    /// Page width in layout units.
    pub width: f64,
    /// Page height in layout units.
    pub height: f64,
    /// Margin applied to all four edges, in layout units.
    pub margin: f64,
}

impl PageFormat {
    /// A4 portrait with a 10-unit margin: 190×277 content rectangle.
    pub const A4: PageFormat = PageFormat {
        width: 210.0,
        height: 297.0,
        margin: 10.0,
    };

    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }

    /// Aspect ratio (width/height) of the content rectangle, ≈0.686 for A4.
    pub fn content_aspect(&self) -> f64 {
        self.content_width() / self.content_height()
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4
    }
}

/// Where one image lands on its page, in layout units.
///
/// `x`/`y` are the lower-left corner measured from the page's lower-left
/// corner, matching the PDF coordinate convention used at composition time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale an image of the given aspect ratio (width/height) to the largest
/// size fitting the content rectangle, then center it on the full page.
pub fn fit_to_page(aspect: f64, format: &PageFormat) -> Placement {
    let content_w = format.content_width();
    let content_h = format.content_height();

    // Width-first: pin to content width, re-fit to height only on overflow.
    let mut width = content_w;
    let mut height = content_w / aspect;
    if height > content_h {
        height = content_h;
        width = content_h * aspect;
    }

    Placement {
        x: (format.width - width) / 2.0,
        y: (format.height - height) / 2.0,
        width,
        height,
    }
}
