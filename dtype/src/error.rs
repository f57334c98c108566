use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Type tag is not one of the supported element families.
    #[snafu(display("unsupported element type tag: {tag:?}"))]
    UnknownElemTag { tag: String },

    #[snafu(display("invalid access direction: {value:?} (expected r, w or rw)"))]
    InvalidAccess { value: String },

    #[snafu(display("invalid access code: {code} (expected 0, 1 or 2)"))]
    InvalidAccessCode { code: i32 },
}
