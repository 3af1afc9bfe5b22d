//! Diagram support for module docs: with the `doc` feature, ```` ```svgbob ```` blocks are
//! rendered by `svgbobdoc`; otherwise the doc attributes are concatenated unchanged.

#[cfg(feature = "doc")]
macro_rules! make_svgbobdoc {
    ($($t:tt)*) => (
        svgbobdoc::transform!($($t)*)
    )
}

#[cfg(not(feature = "doc"))]
macro_rules! make_svgbobdoc {
    ($( #![doc = $d:literal] )*) => (
        core::concat!($( $d, '\n' ),*)
    );
}

pub(crate) use make_svgbobdoc;
