// Tenantd Provisioning Platform - Domain Layer
// Bounded Contexts:
// - shared_kernel: Tipos base, IDs y errores compartidos
// - provision: ProvisionRequest aggregate (ledger row) + Progress state machine
// - ledger: ProvisionLedger repository port
// - platform: DeploymentPlatform port, request specs, PlatformError
// - response: PlatformResponse union + id normalizer
// - scheduler: JobScheduler port, deterministic job ids

pub mod shared_kernel;
pub mod provision;
pub mod ledger;
pub mod platform;
pub mod response;
pub mod scheduler;

pub use shared_kernel::*;
pub use provision::*;
pub use ledger::*;
pub use platform::*;
pub use response::*;
pub use scheduler::*;
