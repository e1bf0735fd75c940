//! Two-sample tests used to compare a measurement between outcome groups.
//!
//! Both tests are two-sided. Samples must already have missing values removed.
use crate::error::{AnalysisError, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use std::cmp::Ordering;

/// Samples where both have more than this many observations never use the exact distribution.
const MAX_EXACT: usize = 8;

/// How the Mann-Whitney p-value was calculated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum MannWhitneyMethod {
    /// From the exact null distribution of `U`.
    Exact,
    /// Normal approximation with tie and continuity correction.
    Asymptotic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub n_a: usize,
    pub n_b: usize,
    pub welch_t: f64,
    pub welch_df: f64,
    pub welch_p: f64,
    /// `U` for sample `a`.
    pub mann_whitney_u: f64,
    pub mann_whitney_p: f64,
    pub mann_whitney_method: MannWhitneyMethod,
}

/// Run Welch's t-test and the Mann-Whitney U test on two samples.
pub fn compare(a: &[f64], b: &[f64]) -> Result<Comparison> {
    check_sample('a', a)?;
    check_sample('b', b)?;
    let (welch_t, welch_df, welch_p) = welch(a, b)?;
    let mwu = mann_whitney(a, b)?;
    Ok(Comparison {
        n_a: a.len(),
        n_b: b.len(),
        welch_t,
        welch_df,
        welch_p,
        mann_whitney_u: mwu.u,
        mann_whitney_p: mwu.p,
        mann_whitney_method: mwu.method,
    })
}

fn check_sample(sample: char, values: &[f64]) -> Result<()> {
    if values.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            sample,
            count: values.len(),
        });
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidArgument(format!(
            "sample {} contains the non-finite value {}",
            sample, bad
        )));
    }
    Ok(())
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Unbiased sample variance (n - 1 denominator).
fn variance(xs: &[f64], mean: f64) -> f64 {
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() as f64 - 1.)
}

fn stats_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::InvalidArgument(e.to_string())
}

/// `(t, df, p)`, all NaN if neither sample varies.
fn welch(a: &[f64], b: &[f64]) -> Result<(f64, f64, f64)> {
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (ma, mb) = (mean(a), mean(b));
    let se_a = variance(a, ma) / na;
    let se_b = variance(b, mb) / nb;
    let se2 = se_a + se_b;
    if se2 == 0. {
        return Ok((f64::NAN, f64::NAN, f64::NAN));
    }
    let t = (ma - mb) / se2.sqrt();
    // Welch-Satterthwaite
    let df = se2.powi(2) / (se_a.powi(2) / (na - 1.) + se_b.powi(2) / (nb - 1.));
    let dist = StudentsT::new(0., 1., df).map_err(stats_error)?;
    // the lower tail keeps precision for large |t|
    let p = (2. * dist.cdf(-t.abs())).min(1.);
    Ok((t, df, p))
}

struct MannWhitney {
    u: f64,
    p: f64,
    method: MannWhitneyMethod,
}

fn mann_whitney(a: &[f64], b: &[f64]) -> Result<MannWhitney> {
    let (na, nb) = (a.len(), b.len());
    let mut pooled: Vec<(f64, bool)> = a
        .iter()
        .map(|v| (*v, true))
        .chain(b.iter().map(|v| (*v, false)))
        .collect();
    pooled.sort_by(|l, r| l.0.partial_cmp(&r.0).unwrap_or(Ordering::Equal));

    // mid-ranks, summing t^3 - t over tie groups for the variance correction
    let mut rank_sum_a = 0.;
    let mut tie_term = 0.;
    let mut start = 0;
    while start < pooled.len() {
        let mut end = start + 1;
        while end < pooled.len() && pooled[end].0 == pooled[start].0 {
            end += 1;
        }
        let rank = (start + 1 + end) as f64 / 2.;
        let in_a = pooled[start..end].iter().filter(|(_, is_a)| *is_a).count();
        rank_sum_a += rank * in_a as f64;
        let t = (end - start) as f64;
        tie_term += t.powi(3) - t;
        start = end;
    }

    let n1n2 = (na * nb) as f64;
    let u_a = rank_sum_a - (na * (na + 1)) as f64 / 2.;
    let u_big = u_a.max(n1n2 - u_a);

    if na.min(nb) <= MAX_EXACT && tie_term == 0. {
        // no ties, so U is a whole number
        if let Some(p) = exact_p(na, nb, (n1n2 - u_big).round() as usize) {
            return Ok(MannWhitney {
                u: u_a,
                p,
                method: MannWhitneyMethod::Exact,
            });
        }
    }

    let n = (na + nb) as f64;
    let sd = (n1n2 / 12. * ((n + 1.) - tie_term / (n * (n - 1.)))).sqrt();
    let p = if sd == 0. {
        1.
    } else {
        let z = (u_big - n1n2 / 2. - 0.5) / sd;
        let normal = Normal::new(0., 1.).map_err(stats_error)?;
        (2. * normal.cdf(-z)).min(1.)
    };
    Ok(MannWhitney {
        u: u_a,
        p,
        method: MannWhitneyMethod::Asymptotic,
    })
}

/// `2 P(U <= u_small)` under the null hypothesis, or `None` if the counts overflow.
fn exact_p(na: usize, nb: usize, u_small: usize) -> Option<f64> {
    let counts = null_counts(na.min(nb), na.max(nb))?;
    let total = counts.iter().try_fold(0i128, |acc, c| acc.checked_add(*c))?;
    let tail = counts[..=u_small.min(counts.len() - 1)]
        .iter()
        .try_fold(0i128, |acc, c| acc.checked_add(*c))?;
    Some((2. * tail as f64 / total as f64).min(1.))
}

/// Number of arrangements giving each value of `U`, for samples of size `m` and `n`.
///
/// These are the coefficients of the Gaussian binomial `[m + n choose m]_q`, built up as the
/// product of `(1 - q^(n + i)) / (1 - q^i)` for `i` in `1..=m`.
fn null_counts(m: usize, n: usize) -> Option<Vec<i128>> {
    let max_u = m * n;
    let mut poly = vec![0i128; max_u + m + 1];
    poly[0] = 1;
    let mut degree = 0;
    for i in 1..=m {
        let shift = n + i;
        let top = degree + shift;
        // multiply by (1 - q^shift)
        for k in (shift..=top).rev() {
            poly[k] = poly[k].checked_sub(poly[k - shift])?;
        }
        // divide by (1 - q^i), which is exact
        for k in i..=top {
            poly[k] = poly[k].checked_add(poly[k - i])?;
        }
        degree += n;
    }
    poly.truncate(max_u + 1);
    Some(poly)
}

#[cfg(test)]
mod test {
    use super::{compare, null_counts, MannWhitneyMethod};
    use crate::AnalysisError;

    fn close(actual: f64, expected: f64, tol: f64) -> bool {
        (actual - expected).abs() <= tol
    }

    #[test]
    fn separated_samples() {
        let res = compare(&[1., 2., 3., 4., 5.], &[6., 7., 8., 9., 10.]).unwrap();
        assert!(close(res.welch_t, -5., 1e-12));
        assert!(close(res.welch_df, 8., 1e-9));
        assert!(close(res.welch_p, 0.0010528257933665394, 1e-7));
        assert_eq!(res.mann_whitney_u, 0.);
        assert_eq!(res.mann_whitney_method, MannWhitneyMethod::Exact);
        assert!(close(res.mann_whitney_p, 2. / 252., 1e-12));
    }

    #[test]
    fn exact_unequal_sizes() {
        let a = [3.1, 0.4, 2.2, 5.9, 1.7, 4.4];
        let b = [
            2.8, 7.3, 6.1, 9.0, 3.3, 8.2, 5.5, 10.4, 7.7, 6.6, 4.9, 12.0,
        ];
        let res = compare(&a, &b).unwrap();
        assert!(close(res.welch_t, -3.58436819074637, 1e-9));
        assert!(close(res.welch_df, 13.495820370756363, 1e-9));
        assert!(close(res.welch_p, 0.003152505676357094, 1e-6));
        assert_eq!(res.mann_whitney_u, 7.);
        assert_eq!(res.mann_whitney_method, MannWhitneyMethod::Exact);
        assert!(close(res.mann_whitney_p, 0.004740357681534152, 1e-12));
    }

    #[test]
    fn ties_use_normal_approximation() {
        let a = [1., 2., 2., 3., 4., 5., 6., 7., 8., 9.];
        let b = [2., 3., 5., 7., 9., 11., 12., 13., 14., 15.];
        let res = compare(&a, &b).unwrap();
        assert!(close(res.welch_t, -2.5739260006912046, 1e-9));
        assert!(close(res.welch_df, 14.60507108499935, 1e-9));
        assert!(close(res.welch_p, 0.021507795894656116, 1e-6));
        assert_eq!(res.mann_whitney_u, 22.);
        assert_eq!(res.mann_whitney_method, MannWhitneyMethod::Asymptotic);
        assert!(close(res.mann_whitney_p, 0.03706158629159535, 1e-6));
    }

    #[test]
    fn swapping_samples() {
        let a = [0.5, -3.2, 12.0, 4.4, 4.4, 7.1, -0.3];
        let b = [2.2, 9.9, 13.5, 6.0, 4.4, 8.8];
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        assert!(close(ab.welch_t, -ba.welch_t, 1e-12));
        assert!(close(ab.welch_p, ba.welch_p, 1e-12));
        assert!(close(ab.mann_whitney_p, ba.mann_whitney_p, 1e-12));
        assert_eq!(ab.mann_whitney_u, (a.len() * b.len()) as f64 - ba.mann_whitney_u);
        // pure
        assert_eq!(ab, compare(&a, &b).unwrap());
    }

    #[test]
    fn too_few_observations() {
        let err = compare(&[1., 2.], &[3.]).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                sample: 'b',
                count: 1
            }
        ));
        assert!(matches!(
            compare(&[], &[1., 2.]),
            Err(AnalysisError::InsufficientData { sample: 'a', .. })
        ));
    }

    #[test]
    fn non_finite_rejected() {
        assert!(matches!(
            compare(&[1., f64::NAN], &[1., 2.]),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn no_variance() {
        let res = compare(&[2., 2., 2.], &[2., 2.]).unwrap();
        assert!(res.welch_t.is_nan());
        assert!(res.welch_p.is_nan());
        assert_eq!(res.mann_whitney_p, 1.);
    }

    #[test]
    fn null_distribution() {
        // U for samples of 2 and 3 takes the values 0..=6 in 10 equally likely arrangements
        assert_eq!(null_counts(2, 3).unwrap(), vec![1, 1, 2, 2, 2, 1, 1]);
        let counts = null_counts(8, 40).unwrap();
        assert_eq!(counts.len(), 321);
        // C(48, 8)
        assert_eq!(counts.iter().sum::<i128>(), 377_348_994);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[320], 1);
    }
}
