use std::fmt;

/// Named stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    Prepare,
    EnsureSession,
    Navigate,
    OpenOrders,
    SelectTab,
    ApplyFilter,
    SelectAll,
    TriggerGeneration,
    AwaitOutcome,
    MaterializeArtifact,
}

impl WorkflowStep {
    /// Steps that lead up to the generation job, in order.
    pub const LEAD_IN: [WorkflowStep; 7] = [
        WorkflowStep::EnsureSession,
        WorkflowStep::Navigate,
        WorkflowStep::OpenOrders,
        WorkflowStep::SelectTab,
        WorkflowStep::ApplyFilter,
        WorkflowStep::SelectAll,
        WorkflowStep::TriggerGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Prepare => "prepare",
            WorkflowStep::EnsureSession => "ensure_session",
            WorkflowStep::Navigate => "navigate",
            WorkflowStep::OpenOrders => "open_orders",
            WorkflowStep::SelectTab => "select_tab",
            WorkflowStep::ApplyFilter => "apply_filter",
            WorkflowStep::SelectAll => "select_all",
            WorkflowStep::TriggerGeneration => "trigger_generation",
            WorkflowStep::AwaitOutcome => "await_outcome",
            WorkflowStep::MaterializeArtifact => "materialize_artifact",
        }
    }

    /// After these steps the application sometimes surfaces the result on its
    /// own, so the orchestrator looks for a confirmation surface.
    pub fn checks_for_surface(&self) -> bool {
        matches!(
            self,
            WorkflowStep::SelectTab | WorkflowStep::ApplyFilter | WorkflowStep::SelectAll
        )
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal result of a step. Hard failures travel as `Err(RunError)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    /// The step could not do its job but the run can continue.
    SoftFailure(String),
}
