/// The string type used throughout the project. `ArcStr` is a cheap-to-clone
/// immutable string, which fits configuration and identity strings that are
/// created once and copied around many times.
pub type Strng = arcstr::ArcStr;

pub use arcstr::format;
pub use arcstr::literal;

pub fn new<A: AsRef<str>>(s: A) -> Strng {
	s.as_ref().into()
}
