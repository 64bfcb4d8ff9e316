use tracing::trace;

// Counters and timings are emitted as trace events; the Prometheus recorder
// installed in main only serves whatever the exporter itself tracks.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "vton.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn inc_gateway_action(action: &'static str) {
    trace!(
        target = "vton.metrics",
        action = action,
        "gateway_actions_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "vton.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn poll_attempt(job_id: &str, attempt: u32, status: &str) {
    trace!(
        target = "vton.metrics",
        job_id = job_id,
        attempt = attempt,
        status = status,
        "poll_attempts_total_inc"
    );
}

pub fn pair_finished(mode: &'static str, ok: bool) {
    trace!(
        target = "vton.metrics",
        mode = mode,
        outcome = if ok { "done" } else { "error" },
        "pairs_total_inc"
    );
}
