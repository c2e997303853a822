use faer::{ColRef, unzip, zip};

use crate::E;

pub(crate) fn col_sum<'a>(x: ColRef<'a, E>) -> E {
    let mut total = E::from(0.);
    zip!(x).for_each(|unzip!(x)| total += *x);
    total
}

/// Pearson correlation coefficient between two columns of equal length.
///
/// Returns `0.0` if either column has zero variance, which guards the ALS tolerance update
/// against a factor that collapsed to a constant rather than producing `NaN`.
pub(crate) fn pearson_correlation<'a>(x: ColRef<'a, E>, y: ColRef<'a, E>) -> E {
    let n = x.nrows() as E;
    if n == 0. {
        return 0.;
    }
    let mean_x = col_sum(x) / n;
    let mean_y = col_sum(y) / n;

    let mut cov = 0.;
    let mut var_x = 0.;
    let mut var_y = 0.;
    zip!(x, y).for_each(|unzip!(xi, yi)| {
        let dx = *xi - mean_x;
        let dy = *yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    });

    if var_x <= 0. || var_y <= 0. {
        return 0.;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}
