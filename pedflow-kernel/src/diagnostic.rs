use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize)]
pub struct DiagnosticLog {
    pub scenario: String,
    pub total_steps: usize,
    pub preprocess_metrics: PreprocessMetrics,
    pub step_metrics: StepMetricsCollection,
    /// Per-door flow statistics, snapshotted at the end of a run.
    pub door_flow: Vec<DoorFlowStats>,
}

impl DiagnosticLog {
    pub fn push(&mut self, step_metrics: StepMetrics) {
        self.step_metrics.push(step_metrics);
        self.total_steps += 1;
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StepMetricsCollection {
    pub active_ped_count: Vec<usize>,
    pub time_events: Vec<f64>,
    pub time_routing: Vec<f64>,
    pub time_model: Vec<f64>,
    pub time_update: Vec<f64>,
}

impl StepMetricsCollection {
    pub fn push(&mut self, metrics: StepMetrics) {
        self.active_ped_count.push(metrics.active_ped_count);
        self.time_events.push(metrics.time_events);
        self.time_routing.push(metrics.time_routing);
        self.time_model.push(metrics.time_model);
        self.time_update.push(metrics.time_update);
    }
}

/// Flow history of one door: every passing as (time, cumulative count,
/// agent id).
#[derive(Debug, Default, Clone, Serialize)]
pub struct DoorFlowStats {
    pub door_id: i32,
    pub usage: u64,
    pub last_passing_time: Option<f64>,
    pub flow_curve: Vec<(f64, u64, u64)>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PreprocessMetrics {
    pub time_build_router: f64,
    pub time_build_fields: f64,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct StepMetrics {
    pub active_ped_count: usize,
    pub time_events: f64,
    pub time_routing: f64,
    pub time_model: f64,
    pub time_update: f64,
}
