/// Elements with an encoded width in bytes (eg. instructions, whose offsets are the sum of the
/// widths of the instructions before them)
pub trait Width {
    fn width(&self) -> usize;
}
