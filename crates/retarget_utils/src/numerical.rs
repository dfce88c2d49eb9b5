use nalgebra as na;

use crate::vector::{Matrix3d, Vector3d};

/// Below this magnitude an axis-angle vector (or a direction) is treated as
/// zero and never normalized.
pub const ROTATION_EPSILON: f64 = 1e-6;

/// Skew-symmetric cross product matrix of ``v`` so that ``skew(v) * u == v x u``
pub fn skew(v: &Vector3d) -> Matrix3d {
    Matrix3d::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Rodrigues formula for a single axis-angle vector.
/// The direction of ``axis_angle`` is the axis and its norm the angle in
/// radians. Near-zero vectors give the identity.
pub fn rodrigues(axis_angle: &Vector3d) -> Matrix3d {
    let angle = axis_angle.norm();
    if angle < ROTATION_EPSILON {
        return Matrix3d::identity();
    }
    let k = skew(&(axis_angle / angle));
    Matrix3d::identity() + angle.sin() * k + (1.0 - angle.cos()) * (k * k)
}

/// Converts a matrix that is already a proper rotation into a unit
/// quaternion without the iterative re-orthonormalization of
/// ``Rotation3::from_matrix``
pub fn matrix_to_quaternion(rot: &Matrix3d) -> na::UnitQuaternion<f64> {
    na::UnitQuaternion::from_rotation_matrix(&na::Rotation3::from_matrix_unchecked(*rot))
}

/// Axis-angle (scaled axis) of a unit quaternion. Identity gives zeros.
pub fn quaternion_to_axis_angle(q: &na::UnitQuaternion<f64>) -> Vector3d {
    q.scaled_axis()
}

/// Angle in radians between two vectors, zero if either is degenerate
pub fn angle_between(a: &Vector3d, b: &Vector3d) -> f64 {
    let (na_, nb) = (a.norm(), b.norm());
    if na_ < ROTATION_EPSILON || nb < ROTATION_EPSILON {
        return 0.0;
    }
    a.cross(b).norm().atan2(a.dot(b))
}

/// Minimal rotation taking the direction of ``from`` onto the direction of
/// ``to``. Neither vector needs to be normalized. Degenerate inputs give the
/// identity and opposite vectors give a half turn about a perpendicular axis.
pub fn rotation_between(from: &Vector3d, to: &Vector3d) -> na::UnitQuaternion<f64> {
    let (n_from, n_to) = (from.norm(), to.norm());
    if n_from < ROTATION_EPSILON || n_to < ROTATION_EPSILON {
        return na::UnitQuaternion::identity();
    }
    let from = from / n_from;
    let to = to / n_to;
    let cross = from.cross(&to);
    let sin = cross.norm();
    let cos = from.dot(&to);

    if sin < 1e-12 {
        if cos > 0.0 {
            return na::UnitQuaternion::identity();
        }
        let helper = if from.x.abs() < 0.9 { Vector3d::x() } else { Vector3d::y() };
        let perp = na::Unit::new_normalize(from.cross(&helper));
        return na::UnitQuaternion::from_axis_angle(&perp, std::f64::consts::PI);
    }

    let axis = na::Unit::new_unchecked(cross / sin);
    na::UnitQuaternion::from_axis_angle(&axis, sin.atan2(cos))
}

/// Twist angle about ``axis`` that best maps every ``(from, to)`` pair onto
/// each other once both are projected on the plane orthogonal to ``axis``
/// (least squares over the pairs). Zero when the pairs carry no twist
/// information.
pub fn best_twist_angle(axis: &na::Unit<Vector3d>, pairs: &[(Vector3d, Vector3d)]) -> f64 {
    let a = axis.into_inner();
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    for (from, to) in pairs {
        let from_p = from - a * from.dot(&a);
        let to_p = to - a * to.dot(&a);
        sin_sum += a.dot(&from_p.cross(&to_p));
        cos_sum += from_p.dot(&to_p);
    }
    if sin_sum.abs() < 1e-12 && cos_sum.abs() < 1e-12 {
        return 0.0;
    }
    sin_sum.atan2(cos_sum)
}

/// Checks that ``rot`` is orthonormal with determinant +1 within ``tol``
pub fn is_proper_rotation(rot: &Matrix3d, tol: f64) -> bool {
    let should_be_identity = rot.transpose() * rot;
    (should_be_identity - Matrix3d::identity()).amax() < tol && (rot.determinant() - 1.0).abs() < tol
}
