// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// The subject aggregate: value objects, lifecycle errors and the
// orchestrator that coordinates the store, billing and the event stream.
//
// ============================================================================

pub mod subject;
