use natstat_common::{AddressTuple, Flow};

mod category;
mod classify;
mod filter;
mod frontend;
mod local;

pub use category::*;
pub use classify::*;
pub use filter::*;
pub use frontend::*;
pub use local::*;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read local interface addresses: {0}")]
    Configuration(#[source] nix::Error),
}

/// Anything carrying an original and a reply address tuple can be classified.
pub trait Filterable {
    fn original(&self) -> &AddressTuple;

    fn reply(&self) -> &AddressTuple;
}

impl Filterable for Flow {
    #[inline]
    fn original(&self) -> &AddressTuple {
        &self.original
    }

    #[inline]
    fn reply(&self) -> &AddressTuple {
        &self.reply
    }
}

impl<F: Filterable> Filterable for &F {
    #[inline]
    fn original(&self) -> &AddressTuple {
        (**self).original()
    }

    #[inline]
    fn reply(&self) -> &AddressTuple {
        (**self).reply()
    }
}
