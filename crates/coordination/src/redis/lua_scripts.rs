//! Lua scripts for atomic lock operations.
//!
//! Acquisition needs no script: `SET key token NX PX ttl` is natively
//! atomic. Release does: the GET/compare/DEL sequence must execute as one
//! unit, otherwise a holder whose lease expired mid-release could delete a
//! lock that another instance re-acquired in between.

/// Lua script for compare-and-delete release.
///
/// Arguments:
/// - KEYS[1]: Lock key (e.g., `atrium:lock:recording:{roomId}`)
/// - ARGV[1]: Holder token the caller acquired with
///
/// Returns:
/// - 1: Lock released (value matched and key deleted)
/// - 0: No-op (key absent, or held by a different token)
pub const RELEASE_IF_OWNER: &str = r"
local current = redis.call('GET', KEYS[1])

if current == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end

return 0
";
