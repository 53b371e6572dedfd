use std::cell::Cell;
use std::rc::{Rc, Weak};

use glam::Vec3;

/// A caller-owned moving point that pooled instances can follow.
///
/// Instances link to an anchor through a weak reference, so dropping the anchor is the way to
/// say "this target is gone". Links to a dropped anchor stop on the next tick.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
///
/// use glam::Vec3;
/// use spawn_pool::Anchor;
///
/// let anchor = Rc::new(Anchor::new(Vec3::ZERO));
/// anchor.set_position(Vec3::new(1.0, 2.0, 3.0));
///
/// assert_eq!(anchor.position(), Vec3::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug, Default)]
pub struct Anchor {
    position: Cell<Vec3>,
}

impl Anchor {
    /// Creates an anchor at the given position.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Cell::new(position),
        }
    }

    /// The current position of the anchor.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position.get()
    }

    /// Moves the anchor. Linked instances pick up the new position on the next tick.
    pub fn set_position(&self, position: Vec3) {
        self.position.set(position);
    }
}

/// Selects which axes of a linked instance's position follow the target.
///
/// Axes that are not selected keep whatever value the instance already has.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Axes {
    x: bool,
    y: bool,
    z: bool,
}

impl Axes {
    /// Follow the target on every axis.
    pub const ALL: Self = Self::new(true, true, true);

    /// Follow the target only on the X and Z axes, e.g. to track something on the ground plane
    /// while keeping a fixed height.
    pub const XZ: Self = Self::new(true, false, true);

    /// Creates a mask from one flag per axis.
    #[must_use]
    pub const fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    /// Whether the X axis follows the target.
    #[must_use]
    pub fn x(self) -> bool {
        self.x
    }

    /// Whether the Y axis follows the target.
    #[must_use]
    pub fn y(self) -> bool {
        self.y
    }

    /// Whether the Z axis follows the target.
    #[must_use]
    pub fn z(self) -> bool {
        self.z
    }

    /// Returns `current` with the selected axes replaced by the values from `to`.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::Vec3;
    /// use spawn_pool::Axes;
    ///
    /// let moved = Axes::XZ.apply(Vec3::new(1.0, 5.0, 1.0), Vec3::new(9.0, 9.0, 9.0));
    ///
    /// assert_eq!(moved, Vec3::new(9.0, 5.0, 9.0));
    /// ```
    #[must_use]
    pub fn apply(self, current: Vec3, to: Vec3) -> Vec3 {
        Vec3::new(
            if self.x { to.x } else { current.x },
            if self.y { to.y } else { current.y },
            if self.z { to.z } else { current.z },
        )
    }
}

impl Default for Axes {
    fn default() -> Self {
        Self::ALL
    }
}

/// Describes how a pooled instance should follow an [`Anchor`].
///
/// Pass this to [`Pooled::start_linking()`][crate::Pooled::start_linking] or
/// [`Pooler::spawn_linked()`][crate::Pooler::spawn_linked]. On every
/// [`Pooler::update_links()`][crate::Pooler::update_links] tick, the instance position
/// becomes the anchor position plus the offset, on the selected axes.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
///
/// use glam::Vec3;
/// use spawn_pool::{Anchor, Axes, LinkerData};
///
/// let player = Rc::new(Anchor::new(Vec3::ZERO));
///
/// let shadow = LinkerData::new(&player)
///     .offset(Vec3::new(0.0, 0.1, 0.0))
///     .axes(Axes::XZ);
/// # drop(shadow);
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct LinkerData {
    target: Weak<Anchor>,
    offset: Vec3,
    axes: Axes,
}

impl LinkerData {
    /// Follows `target` on all axes, without offset.
    pub fn new(target: &Rc<Anchor>) -> Self {
        Self {
            target: Rc::downgrade(target),
            offset: Vec3::ZERO,
            axes: Axes::ALL,
        }
    }

    /// Sets the offset added to the target position.
    pub fn offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Sets which axes follow the target.
    pub fn axes(mut self, axes: Axes) -> Self {
        self.axes = axes;
        self
    }

    /// Whether the target still exists.
    #[must_use]
    pub fn has_target(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// The position a linked instance at `current` should move to, or `None` if the
    /// target has been dropped.
    pub(crate) fn follow(&self, current: Vec3) -> Option<Vec3> {
        let target = self.target.upgrade()?;

        Some(self.axes.apply(current, target.position() + self.offset))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_axes_follow_everything() {
        let axes = Axes::default();

        assert!(axes.x() && axes.y() && axes.z());
        assert_eq!(
            axes.apply(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn no_axes_keep_current() {
        let axes = Axes::new(false, false, false);

        assert_eq!(
            axes.apply(Vec3::new(4.0, 5.0, 6.0), Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(4.0, 5.0, 6.0)
        );
    }

    #[test]
    fn follow_adds_offset_on_selected_axes() {
        let anchor = Rc::new(Anchor::new(Vec3::new(10.0, 10.0, 10.0)));
        let linker = LinkerData::new(&anchor)
            .offset(Vec3::new(1.0, 1.0, 1.0))
            .axes(Axes::new(true, false, false));

        assert_eq!(
            linker.follow(Vec3::new(0.0, 0.0, 0.0)),
            Some(Vec3::new(11.0, 0.0, 0.0))
        );

        anchor.set_position(Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(
            linker.follow(Vec3::new(0.0, 7.0, 7.0)),
            Some(Vec3::new(0.0, 7.0, 7.0))
        );
    }

    #[test]
    fn follow_stops_when_target_dropped() {
        let anchor = Rc::new(Anchor::new(Vec3::ONE));
        let linker = LinkerData::new(&anchor);

        assert!(linker.has_target());

        drop(anchor);

        assert!(!linker.has_target());
        assert_eq!(linker.follow(Vec3::ZERO), None);
    }
}
