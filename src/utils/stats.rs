//! Small descriptive statistics shared by the processing and risk modules

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population variance
pub fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    let mean = mean(values);
    values.iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f32>() / values.len() as f32
}

pub fn std_dev(values: &[f32]) -> f32 {
    variance(values).sqrt()
}

/// Mean absolute deviation from the mean
pub fn mean_absolute_deviation(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    let mean = mean(values);
    values.iter().map(|x| (x - mean).abs()).sum::<f32>() / values.len() as f32
}

/// Coefficient of variation, zero when the mean is not positive
pub fn coefficient_of_variation(values: &[f32]) -> f32 {
    let mean = mean(values);
    if mean <= f32::EPSILON {
        return 0.0;
    }
    std_dev(values) / mean
}
