/// Basic error type for the library.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
  /// A null, zero or otherwise invalid argument was passed; nothing was done.
  InvalidParam,
  /// Memory allocation failed, either on the heap or in a chunk pool.
  OutOfMemory,
  /// The operation cannot proceed while the target is still in use.
  NotReady,
  /// The requested entity does not exist (stale handle, freed chain).
  NotFound,
}
