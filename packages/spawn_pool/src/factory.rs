/// The error type a [`PayloadFactory`] may return when it fails to create a payload.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Creates new payloads for one pool kind.
///
/// Each configured pool kind carries its own factory, which is also the kind's payload
/// template (see [`Pooler::payload_template()`][crate::Pooler::payload_template]). The pool
/// never constructs payloads itself; it calls the factory when the pool is initialized and
/// whenever it expands.
///
/// Any `Fn() -> Result<T, FactoryError>` is a factory, which makes boxed closures a
/// convenient way to configure pools whose kinds are built differently.
///
/// # Examples
///
/// ```
/// use spawn_pool::{FactoryError, PayloadFactory};
///
/// struct Bullet {
///     damage: u32,
/// }
///
/// struct BulletPrefab {
///     damage: u32,
/// }
///
/// impl PayloadFactory for BulletPrefab {
///     type Payload = Bullet;
///
///     fn create(&self) -> Result<Bullet, FactoryError> {
///         Ok(Bullet {
///             damage: self.damage,
///         })
///     }
/// }
///
/// let bullet = BulletPrefab { damage: 10 }.create().unwrap();
/// assert_eq!(bullet.damage, 10);
/// ```
pub trait PayloadFactory {
    /// The type of payload this factory creates.
    type Payload;

    /// Creates one new payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be created. The pool reports this to its caller
    /// as a configuration error for the kind this factory belongs to.
    fn create(&self) -> Result<Self::Payload, FactoryError>;
}

impl<T, F> PayloadFactory for F
where
    F: Fn() -> Result<T, FactoryError>,
{
    type Payload = T;

    fn create(&self) -> Result<T, FactoryError> {
        self()
    }
}

/// A boxed closure factory, for registries whose kinds are built by different closures.
pub type BoxedFactory<T> = Box<dyn Fn() -> Result<T, FactoryError>>;
