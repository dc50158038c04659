use ndarray::{Array2, ArrayView2, Axis};

/// Numerically stable softmax applied to every row in place
pub fn softmax_rows(scores: &mut Array2<f32>) {
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

/// Winning class and its score for every row.
///
/// Ties go to the lowest class index. Rows made only of NaN yield class 0
/// with a NaN score.
pub fn argmax_rows(scores: ArrayView2<'_, f32>) -> Vec<(usize, f32)> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .copied()
                .enumerate()
                .fold((0usize, f32::NAN), |(best, best_score), (i, v)| {
                    if best_score.is_nan() || v > best_score {
                        (i, v)
                    } else {
                        (best, best_score)
                    }
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let mut scores = array![[1.0f32, 2.0, 3.0], [-5.0, 0.0, 5.0]];
        softmax_rows(&mut scores);

        for row in scores.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
        assert!(scores[[0, 2]] > scores[[0, 1]]);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let mut scores = array![[1000.0f32, 1000.0]];
        softmax_rows(&mut scores);
        assert!((scores[[0, 0]] - 0.5).abs() < 1e-5, "no overflow to NaN");
    }

    #[test]
    fn test_argmax_rows() {
        let scores = array![[0.1f32, 0.7, 0.2], [0.9, 0.05, 0.05], [0.3, 0.3, 0.4]];
        let winners = argmax_rows(scores.view());
        assert_eq!(winners.iter().map(|w| w.0).collect::<Vec<_>>(), vec![1, 0, 2]);
        assert!((winners[0].1 - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_tie_prefers_lowest_index() {
        let scores = array![[0.5f32, 0.5]];
        assert_eq!(argmax_rows(scores.view())[0].0, 0);
    }

    #[test]
    fn test_empty_batch() {
        let scores = Array2::<f32>::zeros((0, 4));
        assert!(argmax_rows(scores.view()).is_empty());
    }
}
