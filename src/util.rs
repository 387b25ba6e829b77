/// Elements with a width, measured in local variable slots
pub trait Width {
    fn width(&self) -> usize;
}
