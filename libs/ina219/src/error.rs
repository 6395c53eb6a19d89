use embedded_hal::blocking::i2c::{Write, WriteRead};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    /// the configuration read back from the device differs from the written one
    InvalidConfig,
}

pub type Err<I> = Error<<I as WriteRead>::Error>;

pub type Result<T, I> = ::core::result::Result<T, Err<I>>;

/// Bus requirements of the driver. Writes and write-reads have to fail with the same error type.
pub trait I2c: WriteRead + Write<Error = <Self as WriteRead>::Error> {}

impl<I> I2c for I where I: WriteRead + Write<Error = <I as WriteRead>::Error> {}
