use crate::errors::{check_dim, Error, Result};
use crate::spacetime::lie;
use nalgebra::{
    DMatrix, DVector, Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector2,
    Vector3, Vector6,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const ROOT_JOINT_NAME: &str = "root_joint";

const UNIT_NORM_TOLERANCE: f64 = 1e-6;

/// Joint attaching the root link of a description to the world.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RootJoint {
    /// Root link is fixed to the world
    #[default]
    Fixed,
    /// Mobile base moving in the horizontal plane
    Planar,
    /// Free-floating base
    FreeFlyer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    Revolute { axis: Unit<Vector3<f64>> },
    Prismatic { axis: Unit<Vector3<f64>> },
    /// `q = [x, y, cos θ, sin θ]`, `v = [vx, vy, ω]` in the joint frame
    Planar,
    /// `q = [x, y, z, qx, qy, qz, qw]`, `v = [v; ω]` in the joint frame
    FreeFlyer,
}

impl JointKind {
    pub fn nq(&self) -> usize {
        match self {
            JointKind::Revolute { .. } | JointKind::Prismatic { .. } => 1,
            JointKind::Planar => 4,
            JointKind::FreeFlyer => 7,
        }
    }

    pub fn nv(&self) -> usize {
        match self {
            JointKind::Revolute { .. } | JointKind::Prismatic { .. } => 1,
            JointKind::Planar => 3,
            JointKind::FreeFlyer => 6,
        }
    }
}

/// Position and velocity bounds of a single-dof joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
    pub velocity: f64,
}

impl JointLimits {
    pub fn unbounded() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            velocity: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub kind: JointKind,
    /// Index of the parent joint, `None` for joints attached to the world
    pub parent: Option<usize>,
    /// Joint frame in the parent joint frame, at zero motion
    pub placement: Isometry3<f64>,
    pub idx_q: usize,
    pub idx_v: usize,
    pub limits: JointLimits,
}

impl Joint {
    /// Motion of the joint for its slice of the configuration vector.
    fn motion(&self, q: &[f64]) -> Isometry3<f64> {
        match &self.kind {
            JointKind::Revolute { axis } => {
                Isometry3::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(axis, q[0]))
            }
            JointKind::Prismatic { axis } => {
                Isometry3::from_parts(Translation3::from(axis.into_inner() * q[0]), UnitQuaternion::identity())
            }
            JointKind::Planar => planar_to_isometry(q),
            JointKind::FreeFlyer => free_flyer_to_isometry(q),
        }
    }
}

/// Operational frame rigidly attached to a joint (or to the world).
#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    pub parent_joint: Option<usize>,
    pub placement: Isometry3<f64>,
}

/// Kinematic tree of a robot.
///
/// Joints are stored so that a parent always precedes its children.
#[derive(Debug, Clone)]
pub struct RobotModel {
    pub name: String,
    pub root_joint: RootJoint,
    joints: Vec<Joint>,
    frames: Vec<Frame>,
    nq: usize,
    nv: usize,
}

impl RobotModel {
    pub fn new(name: &str, root_joint: RootJoint) -> Self {
        let mut model = Self {
            name: name.to_string(),
            root_joint,
            joints: Vec::new(),
            frames: Vec::new(),
            nq: 0,
            nv: 0,
        };
        let kind = match root_joint {
            RootJoint::Fixed => None,
            RootJoint::Planar => Some(JointKind::Planar),
            RootJoint::FreeFlyer => Some(JointKind::FreeFlyer),
        };
        if let Some(kind) = kind {
            model.push_joint(ROOT_JOINT_NAME, kind, None, Isometry3::identity(), JointLimits::unbounded());
        }
        model
    }

    /// Index of the joint carrying the root link, if the root is not fixed.
    pub fn root_joint_index(&self) -> Option<usize> {
        match self.root_joint {
            RootJoint::Fixed => None,
            _ => Some(0),
        }
    }

    pub fn add_joint(
        &mut self,
        name: &str,
        kind: JointKind,
        parent: Option<usize>,
        placement: Isometry3<f64>,
        limits: JointLimits,
    ) -> Result<usize> {
        if let Some(p) = parent {
            if p >= self.joints.len() {
                return Err(Error::InvalidModel {
                    reason: format!("parent joint {p} of \"{name}\" does not exist"),
                });
            }
        }
        if self.joints.iter().any(|j| j.name == name) {
            return Err(Error::InvalidModel {
                reason: format!("joint \"{name}\" declared twice"),
            });
        }
        if limits.lower > limits.upper {
            return Err(Error::InvalidModel {
                reason: format!("joint \"{name}\" has lower limit above upper limit"),
            });
        }
        Ok(self.push_joint(name, kind, parent, placement, limits))
    }

    fn push_joint(
        &mut self,
        name: &str,
        kind: JointKind,
        parent: Option<usize>,
        placement: Isometry3<f64>,
        limits: JointLimits,
    ) -> usize {
        let idx = self.joints.len();
        let (nq, nv) = (kind.nq(), kind.nv());
        self.joints.push(Joint {
            name: name.to_string(),
            kind,
            parent,
            placement,
            idx_q: self.nq,
            idx_v: self.nv,
            limits,
        });
        self.nq += nq;
        self.nv += nv;
        self.frames.push(Frame {
            name: name.to_string(),
            parent_joint: Some(idx),
            placement: Isometry3::identity(),
        });
        idx
    }

    pub fn add_frame(&mut self, name: &str, parent_joint: Option<usize>, placement: Isometry3<f64>) -> Result<usize> {
        if matches!(parent_joint, Some(p) if p >= self.joints.len()) {
            return Err(Error::InvalidModel {
                reason: format!("parent joint of frame \"{name}\" does not exist"),
            });
        }
        self.frames.push(Frame {
            name: name.to_string(),
            parent_joint,
            placement,
        });
        Ok(self.frames.len() - 1)
    }

    /// Builds a model from a URDF string. Joints are ordered depth-first,
    /// children in declaration order.
    pub fn from_urdf_str(urdf: &str, root_joint: RootJoint) -> Result<Self> {
        let description = urdf_rs::read_from_string(urdf).map_err(|e| Error::InvalidModel {
            reason: format!("cannot parse URDF: {e}"),
        })?;
        Self::from_urdf(&description, root_joint)
    }

    pub fn from_urdf_file<P: AsRef<Path>>(path: P, root_joint: RootJoint) -> Result<Self> {
        let description = urdf_rs::read_file(path.as_ref()).map_err(|e| Error::InvalidModel {
            reason: format!("cannot read URDF {}: {e}", path.as_ref().display()),
        })?;
        Self::from_urdf(&description, root_joint)
    }

    pub fn from_urdf(description: &urdf_rs::Robot, root_joint: RootJoint) -> Result<Self> {
        let children: HashSet<&str> = description
            .joints
            .iter()
            .map(|j| j.child.link.as_str())
            .collect();
        let root_link = description
            .links
            .iter()
            .find(|l| !children.contains(l.name.as_str()))
            .ok_or_else(|| Error::InvalidModel {
                reason: format!("no root link in \"{}\"", description.name),
            })?;

        let mut model = RobotModel::new(&description.name, root_joint);
        let root_parent = model.root_joint_index();
        model.add_frame(&root_link.name, root_parent, Isometry3::identity())?;

        // Joints are added depth-first in declaration order, so that a chain
        // is numbered before its siblings.
        let children_of = |link: &str| {
            description
                .joints
                .iter()
                .filter(|j| j.parent.link == link)
                .collect::<Vec<_>>()
        };
        // (joint, parent joint, parent link frame in parent joint frame)
        let mut stack: Vec<_> = children_of(&root_link.name)
            .into_iter()
            .rev()
            .map(|j| (j, root_parent, Isometry3::identity()))
            .collect();
        while let Some((joint, parent, link_placement)) = stack.pop() {
            let placement = link_placement * urdf_origin(&joint.origin);
            let axis = urdf_axis(&joint.axis);
            let limits = urdf_limits(joint);
            let (child_parent, child_placement) = match joint.joint_type {
                urdf_rs::JointType::Fixed => {
                    model.add_frame(&joint.name, parent, placement)?;
                    (parent, placement)
                }
                urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => {
                    let idx = model.add_joint(&joint.name, JointKind::Revolute { axis }, parent, placement, limits)?;
                    (Some(idx), Isometry3::identity())
                }
                urdf_rs::JointType::Prismatic => {
                    let idx = model.add_joint(&joint.name, JointKind::Prismatic { axis }, parent, placement, limits)?;
                    (Some(idx), Isometry3::identity())
                }
                ref other => {
                    return Err(Error::InvalidModel {
                        reason: format!("joint \"{}\" has unsupported type {other:?}", joint.name),
                    })
                }
            };
            model.add_frame(&joint.child.link, child_parent, child_placement)?;
            stack.extend(
                children_of(&joint.child.link)
                    .into_iter()
                    .rev()
                    .map(|j| (j, child_parent, child_placement)),
            );
        }
        log::info!(
            "Loaded \"{}\" with {} joints (nq = {}, nv = {})",
            model.name,
            model.joints.len(),
            model.nq,
            model.nv
        );
        Ok(model)
    }

    pub fn nq(&self) -> usize {
        self.nq
    }

    pub fn nv(&self) -> usize {
        self.nv
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn joint(&self, name: &str) -> Result<&Joint> {
        self.joints.iter().find(|j| j.name == name).ok_or_else(|| Error::InvalidModel {
            reason: format!("joint \"{name}\" not found in \"{}\"", self.name),
        })
    }

    pub fn frame(&self, name: &str) -> Result<&Frame> {
        self.frames.iter().find(|f| f.name == name).ok_or_else(|| Error::InvalidModel {
            reason: format!("frame \"{name}\" not found in \"{}\"", self.name),
        })
    }

    /// Neutral configuration: zero joint angles, identity base.
    pub fn neutral(&self) -> DVector<f64> {
        let mut q = DVector::zeros(self.nq);
        for joint in &self.joints {
            match joint.kind {
                JointKind::Planar => q[joint.idx_q + 2] = 1.0,
                JointKind::FreeFlyer => q[joint.idx_q + 6] = 1.0,
                _ => {}
            }
        }
        q
    }

    /// Lower configuration limits, `-inf` for unbounded coordinates.
    pub fn lower_position_limits(&self) -> DVector<f64> {
        self.position_limits(|l| l.lower, f64::NEG_INFINITY)
    }

    /// Upper configuration limits, `+inf` for unbounded coordinates.
    pub fn upper_position_limits(&self) -> DVector<f64> {
        self.position_limits(|l| l.upper, f64::INFINITY)
    }

    fn position_limits(&self, bound: impl Fn(&JointLimits) -> f64, unbounded: f64) -> DVector<f64> {
        let mut out = DVector::from_element(self.nq, unbounded);
        for joint in &self.joints {
            if joint.kind.nq() == 1 {
                out[joint.idx_q] = bound(&joint.limits);
            }
        }
        out
    }

    pub fn velocity_limits(&self) -> DVector<f64> {
        let mut out = DVector::from_element(self.nv, f64::INFINITY);
        for joint in &self.joints {
            if joint.kind.nv() == 1 {
                out[joint.idx_v] = joint.limits.velocity;
            }
        }
        out
    }

    /// Checks the length of `q` and that the rotation coordinates of planar
    /// and free-flyer joints have unit norm.
    pub fn check_configuration(&self, q: &DVector<f64>) -> Result<()> {
        check_dim("configuration", self.nq, q.len())?;
        for joint in &self.joints {
            let rotation = match joint.kind {
                JointKind::Planar => q.rows(joint.idx_q + 2, 2),
                JointKind::FreeFlyer => q.rows(joint.idx_q + 3, 4),
                _ => continue,
            };
            let norm = rotation.norm();
            if !((norm - 1.0).abs() <= UNIT_NORM_TOLERANCE) {
                return Err(Error::InvalidModel {
                    reason: format!(
                        "rotation coordinates of joint \"{}\" have norm {norm}, expected 1",
                        joint.name
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn check_velocity(&self, v: &DVector<f64>) -> Result<()> {
        check_dim("velocity", self.nv, v.len())
    }

    /// World placement of every joint frame.
    pub fn forward_kinematics(&self, q: &DVector<f64>) -> Result<Vec<Isometry3<f64>>> {
        self.check_configuration(q)?;
        let mut out: Vec<Isometry3<f64>> = Vec::with_capacity(self.joints.len());
        for joint in &self.joints {
            let parent = joint.parent.map(|p| out[p]).unwrap_or_else(Isometry3::identity);
            let slice = &q.as_slice()[joint.idx_q..joint.idx_q + joint.kind.nq()];
            out.push(parent * joint.placement * joint.motion(slice));
        }
        Ok(out)
    }

    /// World placement of a frame given precomputed joint placements.
    pub fn frame_placement(&self, frame: &Frame, joint_placements: &[Isometry3<f64>]) -> Isometry3<f64> {
        match frame.parent_joint {
            Some(j) => joint_placements[j] * frame.placement,
            None => frame.placement,
        }
    }

    /// Frame Jacobian expressed in the frame itself, rows `[linear; angular]`.
    pub fn frame_jacobian(&self, frame: &Frame, joint_placements: &[Isometry3<f64>]) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(6, self.nv);
        let frame_to_world = self.frame_placement(frame, joint_placements);
        let p_frame = frame_to_world.translation.vector;
        let world_to_frame = frame_to_world.rotation.inverse();

        let mut set_column = |col: usize, linear: Vector3<f64>, angular: Vector3<f64>| {
            let l = world_to_frame * linear;
            let a = world_to_frame * angular;
            jacobian.set_column(col, &Vector6::new(l.x, l.y, l.z, a.x, a.y, a.z));
        };

        let mut support = frame.parent_joint;
        while let Some(j) = support {
            let joint = &self.joints[j];
            let placement = &joint_placements[j];
            let rot = placement.rotation;
            let lever = p_frame - placement.translation.vector;
            let rotational = |axis: Vector3<f64>| {
                let w = rot * axis;
                (w.cross(&lever), w)
            };
            match &joint.kind {
                JointKind::Revolute { axis } => {
                    let (l, a) = rotational(axis.into_inner());
                    set_column(joint.idx_v, l, a);
                }
                JointKind::Prismatic { axis } => {
                    set_column(joint.idx_v, rot * axis.into_inner(), Vector3::zeros());
                }
                JointKind::Planar => {
                    set_column(joint.idx_v, rot * Vector3::x(), Vector3::zeros());
                    set_column(joint.idx_v + 1, rot * Vector3::y(), Vector3::zeros());
                    let (l, a) = rotational(Vector3::z());
                    set_column(joint.idx_v + 2, l, a);
                }
                JointKind::FreeFlyer => {
                    for k in 0..3 {
                        let e = Vector3::ith(k, 1.0);
                        set_column(joint.idx_v + k, rot * e, Vector3::zeros());
                        let (l, a) = rotational(e);
                        set_column(joint.idx_v + 3 + k, l, a);
                    }
                }
            }
            support = joint.parent;
        }
        jacobian
    }

    /// Configuration reached from `q` after following `v` during `dt`.
    pub fn integrate(&self, q: &DVector<f64>, v: &DVector<f64>, dt: f64) -> Result<DVector<f64>> {
        self.check_configuration(q)?;
        self.check_velocity(v)?;
        let mut out = q.clone();
        for joint in &self.joints {
            let (iq, iv) = (joint.idx_q, joint.idx_v);
            match joint.kind {
                JointKind::Revolute { .. } | JointKind::Prismatic { .. } => {
                    out[iq] = q[iq] + v[iv] * dt;
                }
                JointKind::Planar => {
                    let theta = q[iq + 3].atan2(q[iq + 2]);
                    let (step, dtheta) = lie::exp2(v[iv] * dt, v[iv + 1] * dt, v[iv + 2] * dt);
                    let (c, s) = (theta.cos(), theta.sin());
                    out[iq] = q[iq] + c * step.x - s * step.y;
                    out[iq + 1] = q[iq + 1] + s * step.x + c * step.y;
                    out[iq + 2] = (theta + dtheta).cos();
                    out[iq + 3] = (theta + dtheta).sin();
                }
                JointKind::FreeFlyer => {
                    let base = free_flyer_to_isometry(&q.as_slice()[iq..iq + 7]);
                    let twist = Vector6::from_iterator(v.rows(iv, 6).iter().map(|x| x * dt));
                    let next = base * lie::exp6(&twist);
                    write_free_flyer(&next, &mut out.as_mut_slice()[iq..iq + 7]);
                }
            }
        }
        Ok(out)
    }

    /// Tangent vector `v` such that `integrate(q0, v, 1.0) == q1`.
    pub fn difference(&self, q0: &DVector<f64>, q1: &DVector<f64>) -> Result<DVector<f64>> {
        self.check_configuration(q0)?;
        self.check_configuration(q1)?;
        let mut out = DVector::zeros(self.nv);
        for joint in &self.joints {
            let (iq, iv) = (joint.idx_q, joint.idx_v);
            match joint.kind {
                JointKind::Revolute { .. } | JointKind::Prismatic { .. } => {
                    out[iv] = q1[iq] - q0[iq];
                }
                JointKind::Planar => {
                    let theta0 = q0[iq + 3].atan2(q0[iq + 2]);
                    let theta1 = q1[iq + 3].atan2(q1[iq + 2]);
                    let dtheta = (theta1 - theta0).sin().atan2((theta1 - theta0).cos());
                    let (c, s) = (theta0.cos(), theta0.sin());
                    let (dx, dy) = (q1[iq] - q0[iq], q1[iq + 1] - q0[iq + 1]);
                    let local = Vector2::new(c * dx + s * dy, -s * dx + c * dy);
                    out.rows_mut(iv, 3).copy_from(&lie::log2(&local, dtheta));
                }
                JointKind::FreeFlyer => {
                    let m0 = free_flyer_to_isometry(&q0.as_slice()[iq..iq + 7]);
                    let m1 = free_flyer_to_isometry(&q1.as_slice()[iq..iq + 7]);
                    out.rows_mut(iv, 6).copy_from(&lie::body_minus(&m1, &m0));
                }
            }
        }
        Ok(out)
    }
}

fn planar_to_isometry(q: &[f64]) -> Isometry3<f64> {
    let theta = q[3].atan2(q[2]);
    Isometry3::from_parts(
        Translation3::new(q[0], q[1], 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta),
    )
}

fn free_flyer_to_isometry(q: &[f64]) -> Isometry3<f64> {
    // stored [qx, qy, qz, qw]
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q[6], q[3], q[4], q[5]));
    Isometry3::from_parts(Translation3::new(q[0], q[1], q[2]), rotation)
}

fn write_free_flyer(m: &Isometry3<f64>, q: &mut [f64]) {
    let t = m.translation.vector;
    let r = m.rotation.coords;
    q[..3].copy_from_slice(&[t.x, t.y, t.z]);
    q[3..].copy_from_slice(&[r[0], r[1], r[2], r[3]]);
}

fn urdf_origin(pose: &urdf_rs::Pose) -> Isometry3<f64> {
    let [x, y, z] = pose.xyz.0;
    let [roll, pitch, yaw] = pose.rpy.0;
    Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}

fn urdf_axis(axis: &urdf_rs::Axis) -> Unit<Vector3<f64>> {
    let [x, y, z] = axis.xyz.0;
    Unit::try_new(Vector3::new(x, y, z), 1e-12).unwrap_or_else(Vector3::x_axis)
}

fn urdf_limits(joint: &urdf_rs::Joint) -> JointLimits {
    let mut limits = JointLimits::unbounded();
    if !matches!(joint.joint_type, urdf_rs::JointType::Continuous) && joint.limit.lower < joint.limit.upper {
        limits.lower = joint.limit.lower;
        limits.upper = joint.limit.upper;
    }
    if joint.limit.velocity > 0.0 {
        limits.velocity = joint.limit.velocity;
    }
    limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TWO_LINK: &str = r#"
<robot name="two_link">
  <link name="base"/>
  <link name="upper"/>
  <link name="lower"/>
  <link name="tool"/>
  <joint name="shoulder" type="revolute">
    <parent link="base"/>
    <child link="upper"/>
    <origin xyz="0 0 0.1" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-3.0" upper="3.0" effort="10" velocity="2.0"/>
  </joint>
  <joint name="elbow" type="revolute">
    <parent link="upper"/>
    <child link="lower"/>
    <origin xyz="1 0 0" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-2.0" upper="2.0" effort="10" velocity="2.0"/>
  </joint>
  <joint name="tool_joint" type="fixed">
    <parent link="lower"/>
    <child link="tool"/>
    <origin xyz="1 0 0" rpy="0 0 0"/>
  </joint>
</robot>
"#;

    #[test]
    fn loads_planar_two_link_arm() {
        let model = RobotModel::from_urdf_str(TWO_LINK, RootJoint::Fixed).unwrap();
        assert_eq!(model.nq(), 2);
        assert_eq!(model.nv(), 2);
        assert_eq!(model.joint("elbow").unwrap().idx_q, 1);
        assert!(model.frame("tool").is_ok());
        assert!(matches!(model.frame("nope"), Err(Error::InvalidModel { .. })));
        assert_relative_eq!(model.velocity_limits()[0], 2.0);
        assert_relative_eq!(model.upper_position_limits()[1], 2.0);
    }

    #[test]
    fn forward_kinematics_of_two_link_arm() {
        let model = RobotModel::from_urdf_str(TWO_LINK, RootJoint::Fixed).unwrap();
        let q = DVector::from_vec(vec![std::f64::consts::FRAC_PI_2, 0.0]);
        let placements = model.forward_kinematics(&q).unwrap();
        let tool = model.frame_placement(model.frame("tool").unwrap(), &placements);
        assert_relative_eq!(tool.translation.vector, Vector3::new(0.0, 2.0, 0.1), epsilon = 1e-12);
    }

    #[test]
    fn free_flyer_adds_seven_coordinates() {
        let model = RobotModel::from_urdf_str(TWO_LINK, RootJoint::FreeFlyer).unwrap();
        assert_eq!(model.nq(), 9);
        assert_eq!(model.nv(), 8);
        let q = model.neutral();
        assert_relative_eq!(q[6], 1.0);
        assert_eq!(model.joint("shoulder").unwrap().idx_q, 7);
        assert_eq!(model.joint("shoulder").unwrap().idx_v, 6);
    }

    #[test]
    fn integrate_then_difference_round_trips() {
        for root in [RootJoint::Fixed, RootJoint::Planar, RootJoint::FreeFlyer] {
            let model = RobotModel::from_urdf_str(TWO_LINK, root).unwrap();
            let q0 = model.neutral();
            let v = DVector::from_fn(model.nv(), |i, _| 0.3 * (i as f64 + 1.0) - 0.7);
            let q1 = model.integrate(&q0, &v, 0.5).unwrap();
            let back = model.difference(&q0, &q1).unwrap();
            assert_relative_eq!(back, v * 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn rejects_wrong_lengths() {
        let model = RobotModel::from_urdf_str(TWO_LINK, RootJoint::Fixed).unwrap();
        let err = model.integrate(&DVector::zeros(3), &DVector::zeros(2), 0.1).unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                what: "configuration",
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn frame_jacobian_matches_finite_differences() {
        let model = RobotModel::from_urdf_str(TWO_LINK, RootJoint::FreeFlyer).unwrap();
        let frame = model.frame("tool").unwrap();
        let mut q = model.neutral();
        q[7] = 0.4;
        q[8] = -0.9;
        let placements = model.forward_kinematics(&q).unwrap();
        let jacobian = model.frame_jacobian(frame, &placements);
        let t0 = model.frame_placement(frame, &placements);

        let eps = 1e-7;
        for k in 0..model.nv() {
            let mut dv = DVector::zeros(model.nv());
            dv[k] = eps;
            let qk = model.integrate(&q, &dv, 1.0).unwrap();
            let tk = model.frame_placement(frame, &model.forward_kinematics(&qk).unwrap());
            let column = lie::body_minus(&tk, &t0) / eps;
            for row in 0..6 {
                assert_relative_eq!(jacobian[(row, k)], column[row], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn rejects_non_unit_base_rotation() {
        for root in [RootJoint::Planar, RootJoint::FreeFlyer] {
            let model = RobotModel::from_urdf_str(TWO_LINK, root).unwrap();
            let zeros = DVector::zeros(model.nq());
            assert!(matches!(model.forward_kinematics(&zeros), Err(Error::InvalidModel { .. })));
            let v = DVector::zeros(model.nv());
            assert!(matches!(model.integrate(&zeros, &v, 0.1), Err(Error::InvalidModel { .. })));
            assert!(model.forward_kinematics(&model.neutral()).is_ok());
        }
    }
}
