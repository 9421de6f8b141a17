//! UART error mapping for STM32L1

use crema_hal::LinkError;
use embassy_stm32::usart::Error as UsartError;

/// Classify an embassy USART error
pub fn link_error(e: UsartError) -> LinkError {
    match e {
        UsartError::Framing => LinkError::Framing,
        UsartError::Noise => LinkError::Noise,
        UsartError::Overrun => LinkError::Overrun,
        UsartError::Parity => LinkError::Parity,
        _ => LinkError::Other,
    }
}
