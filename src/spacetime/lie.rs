//! Lie group helpers on SO(3), SE(3) and SE(2).
//!
//! Motion vectors (twists) are ordered `[linear; angular]`.

use nalgebra::{Isometry3, Matrix3, Matrix6, Translation3, UnitQuaternion, Vector2, Vector3, Vector6};

const SMALL_ANGLE: f64 = 1e-8;
const TAYLOR_ANGLE: f64 = 0.1;

#[inline]
pub fn exp3(w: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*w)
}

#[inline]
pub fn log3(r: &UnitQuaternion<f64>) -> Vector3<f64> {
    r.scaled_axis()
}

/// Exponential map of SE(3).
pub fn exp6(twist: &Vector6<f64>) -> Isometry3<f64> {
    let v = twist.fixed_rows::<3>(0).clone_owned();
    let w = twist.fixed_rows::<3>(3).clone_owned();
    let theta = w.norm();
    let skew = w.cross_matrix();
    let skew2 = skew * skew;
    let left_jacobian = if theta < SMALL_ANGLE {
        Matrix3::identity() + 0.5 * skew + skew2 / 6.0
    } else {
        let theta2 = theta * theta;
        Matrix3::identity()
            + (1.0 - theta.cos()) / theta2 * skew
            + (theta - theta.sin()) / (theta2 * theta) * skew2
    };
    Isometry3::from_parts(Translation3::from(left_jacobian * v), exp3(&w))
}

/// Logarithm map of SE(3), inverse of [`exp6`].
pub fn log6(transform: &Isometry3<f64>) -> Vector6<f64> {
    let w = log3(&transform.rotation);
    let theta = w.norm();
    let skew = w.cross_matrix();
    let coef = if theta < SMALL_ANGLE {
        1.0 / 12.0 + theta * theta / 720.0
    } else {
        (1.0 - theta * theta.sin() / (2.0 * (1.0 - theta.cos()))) / (theta * theta)
    };
    let left_jacobian_inv = Matrix3::identity() - 0.5 * skew + coef * skew * skew;
    let v = left_jacobian_inv * transform.translation.vector;
    Vector6::new(v.x, v.y, v.z, w.x, w.y, w.z)
}

/// Twist `log6(X⁻¹ Y)`, expressed in the frame of `x`.
///
/// Satisfies `y == x * exp6(body_minus(y, x))`.
pub fn body_minus(y: &Isometry3<f64>, x: &Isometry3<f64>) -> Vector6<f64> {
    log6(&x.inv_mul(y))
}

/// Twist `log6(Y X⁻¹)`, expressed in the reference frame.
///
/// Satisfies `y == exp6(spatial_minus(y, x)) * x`.
pub fn spatial_minus(y: &Isometry3<f64>, x: &Isometry3<f64>) -> Vector6<f64> {
    log6(&(y * x.inverse()))
}

/// `β(θ) = 1/θ² - sin θ / (2θ (1 - cos θ))` and `β'(θ) / θ`.
///
/// `β` is the coefficient of `[w]²` in both the inverse left Jacobian of
/// SO(3) and the inverse right Jacobian used by [`jlog3`].
fn log_coefs(theta: f64) -> (f64, f64) {
    let t2 = theta * theta;
    if theta < TAYLOR_ANGLE {
        (
            1.0 / 12.0 + t2 / 720.0 + t2 * t2 / 30240.0,
            1.0 / 360.0 + t2 / 7560.0 + t2 * t2 / 201600.0,
        )
    } else {
        let (st, ct) = theta.sin_cos();
        let beta = 1.0 / t2 - st / (2.0 * theta * (1.0 - ct));
        let beta_dot_over_theta = -2.0 / (t2 * t2) + (theta + st) / (2.0 * t2 * theta * (1.0 - ct));
        (beta, beta_dot_over_theta)
    }
}

/// Jacobian of `log3` at `r` w.r.t. a right perturbation `r * exp3(δ)`.
pub fn jlog3(r: &UnitQuaternion<f64>) -> Matrix3<f64> {
    let w = log3(r);
    let skew = w.cross_matrix();
    let (beta, _) = log_coefs(w.norm());
    Matrix3::identity() + 0.5 * skew + beta * skew * skew
}

/// Jacobian of `log6` at `transform` w.r.t. a right perturbation
/// `transform * exp6(δ)`.
///
/// Finite for rotation angles up to and including π.
pub fn jlog6(transform: &Isometry3<f64>) -> Matrix6<f64> {
    let w = log3(&transform.rotation);
    let p = transform.translation.vector;
    let theta = w.norm();
    let (beta, beta_dot_over_theta) = log_coefs(theta);
    let jlog = jlog3(&transform.rotation);

    // derivative of V⁻¹(w) p w.r.t. w
    let w_dot_p = w.dot(&p);
    let mut coupling = 0.5 * p.cross_matrix()
        + (beta_dot_over_theta * (w * w_dot_p - theta * theta * p)) * w.transpose()
        + beta * (w * p.transpose() - 2.0 * p * w.transpose());
    for i in 0..3 {
        coupling[(i, i)] += beta * w_dot_p;
    }

    let mut jac = Matrix6::zeros();
    jac.fixed_slice_mut::<3, 3>(0, 0).copy_from(&jlog);
    jac.fixed_slice_mut::<3, 3>(0, 3).copy_from(&(coupling * jlog));
    jac.fixed_slice_mut::<3, 3>(3, 3).copy_from(&jlog);
    jac
}

/// Exponential map of SE(2): body velocity `(vx, vy, w)` to `(x, y, θ)`.
pub fn exp2(vx: f64, vy: f64, w: f64) -> (Vector2<f64>, f64) {
    let (a, b) = se2_left_jacobian_coefs(w);
    let t = Vector2::new(a * vx - b * vy, b * vx + a * vy);
    (t, w)
}

/// Logarithm map of SE(2), inverse of [`exp2`].
pub fn log2(translation: &Vector2<f64>, theta: f64) -> Vector3<f64> {
    let (a, b) = se2_left_jacobian_coefs(theta);
    let det = a * a + b * b;
    let vx = (a * translation.x + b * translation.y) / det;
    let vy = (-b * translation.x + a * translation.y) / det;
    Vector3::new(vx, vy, theta)
}

fn se2_left_jacobian_coefs(theta: f64) -> (f64, f64) {
    if theta.abs() < SMALL_ANGLE {
        (1.0 - theta * theta / 6.0, 0.5 * theta)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_poses() -> Vec<Isometry3<f64>> {
        vec![
            Isometry3::identity(),
            Isometry3::new(Vector3::new(0.3, -1.2, 0.7), Vector3::new(0.1, 0.2, -0.3)),
            Isometry3::new(Vector3::new(-2.0, 0.5, 1.1), Vector3::new(1.5, -0.4, 0.9)),
            Isometry3::new(Vector3::new(0.0, 0.0, 0.4), Vector3::new(0.0, 0.0, 3.0)),
            Isometry3::new(Vector3::new(1e-3, 2e-3, 0.0), Vector3::new(1e-10, 0.0, 0.0)),
        ]
    }

    #[test]
    fn exp6_log6_are_inverse() {
        for pose in sample_poses() {
            let back = exp6(&log6(&pose));
            assert_relative_eq!(back.to_homogeneous(), pose.to_homogeneous(), epsilon = 1e-9);
        }
    }

    #[test]
    fn exp6_of_pure_translation() {
        let twist = Vector6::new(1.0, 2.0, 3.0, 0.0, 0.0, 0.0);
        let pose = exp6(&twist);
        assert_relative_eq!(pose.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(pose.rotation.angle(), 0.0);
    }

    #[test]
    fn body_and_spatial_minus_round_trip() {
        let poses = sample_poses();
        for x in &poses {
            for y in &poses {
                let body = x * exp6(&body_minus(y, x));
                let spatial = exp6(&spatial_minus(y, x)) * x;
                assert_relative_eq!(body.to_homogeneous(), y.to_homogeneous(), epsilon = 1e-9);
                assert_relative_eq!(spatial.to_homogeneous(), y.to_homogeneous(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn jlog6_is_identity_at_identity() {
        let jac = jlog6(&Isometry3::identity());
        assert_relative_eq!(jac, Matrix6::identity(), epsilon = 1e-12);
    }

    fn jlog6_by_central_differences(transform: &Isometry3<f64>) -> Matrix6<f64> {
        let step = 1e-6;
        let mut jac = Matrix6::zeros();
        for k in 0..6 {
            let mut delta = Vector6::zeros();
            delta[k] = step;
            let forward = log6(&(transform * exp6(&delta)));
            let backward = log6(&(transform * exp6(&-delta)));
            jac.set_column(k, &((forward - backward) / (2.0 * step)));
        }
        jac
    }

    #[test]
    fn jlog6_matches_finite_differences() {
        let mut poses = sample_poses();
        poses.push(Isometry3::new(Vector3::new(0.2, 0.1, -0.3), Vector3::new(0.03, -0.02, 0.05)));
        poses.push(Isometry3::new(Vector3::new(-0.5, 0.8, 0.2), Vector3::new(0.0, 2.5, 0.0)));
        for pose in poses {
            assert_relative_eq!(jlog6(&pose), jlog6_by_central_differences(&pose), epsilon = 1e-6);
        }
    }

    #[test]
    fn jlog6_stays_finite_near_half_turn() {
        for angle in [std::f64::consts::PI - 1e-7, std::f64::consts::PI] {
            let pose = Isometry3::new(Vector3::new(0.4, -0.1, 0.2), Vector3::new(0.0, 0.0, angle));
            let jac = jlog6(&pose);
            assert!(jac.iter().all(|x| x.is_finite()));
            assert!(jac.amax() < 10.0, "jlog6 entry {} at angle {angle}", jac.amax());
        }
    }

    #[test]
    fn se2_round_trip() {
        for &(vx, vy, w) in &[(0.5, -0.2, 0.0), (1.0, 0.3, 1.2), (-0.4, 2.0, -2.5)] {
            let (t, theta) = exp2(vx, vy, w);
            let v = log2(&t, theta);
            assert_relative_eq!(v, Vector3::new(vx, vy, w), epsilon = 1e-12);
        }
    }
}
