/*!
# PrintWatch DevKit

Test support for the prober and scanner without real printers:
- `MockPrinter`: a UDP SNMP agent on loopback answering from a scripted profile
- Fixtures for settings, devices and snapshot assertions
*/

pub mod mock_printer;
pub mod test_utils;

pub use mock_printer::{MockPrinter, PrinterProfile};
pub use test_utils::{assert_issue_count, device_at, fast_settings, init_logging};
