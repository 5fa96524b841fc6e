//! Stateless capacity and time-window feasibility predicates

/// True iff the summed weights fit within vehicle capacity.
pub fn capacity_ok(weights: &[f64], capacity: f64) -> bool {
    weights.iter().sum::<f64>() <= capacity
}

/// Recompute arrival times (minutes since midnight) for a sequence of
/// matrix-location indices (1-based, 0 is the depot), given a time matrix,
/// the depot's opening time, and a fixed per-stop service duration.
pub fn compute_arrivals(
    sequence: &[usize],
    time_matrix: &[Vec<f64>],
    depot_open_min: f64,
    service_time_min: f64,
) -> Vec<f64> {
    let mut arrivals = Vec::with_capacity(sequence.len());
    let mut clock = depot_open_min;
    let mut prev = 0usize; // depot

    for &loc in sequence {
        let arrival = clock + time_matrix[prev][loc];
        arrivals.push(arrival);
        clock = arrival + service_time_min;
        prev = loc;
    }

    arrivals
}

/// True iff every arrival lies within its stop's `[earliest, latest]` window.
pub fn windows_ok(arrivals: &[f64], windows: &[(f64, f64)]) -> bool {
    arrivals
        .iter()
        .zip(windows.iter())
        .all(|(&arrival, &(earliest, latest))| arrival >= earliest - 1e-6 && arrival <= latest + 1e-6)
}
