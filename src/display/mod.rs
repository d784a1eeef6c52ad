//! Display access for the launched container
//!
//! A [`DisplayGrant`] authorizes local containers to connect to the host X
//! server for as long as the guard lives. Dropping it revokes the access, so
//! every exit path out of a run releases the grant exactly once.

mod xhost;

use tracing::{debug, warn};

use crate::error::Result;

pub use xhost::XhostAccess;

/// Grants and revokes container access to the host display
pub trait DisplayAccess {
    fn grant(&self) -> Result<()>;
    fn revoke(&self) -> Result<()>;
}

/// Access control disabled: the container relies on whatever the host allows
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAccessControl;

impl DisplayAccess for NoAccessControl {
    fn grant(&self) -> Result<()> {
        Ok(())
    }

    fn revoke(&self) -> Result<()> {
        Ok(())
    }
}

/// Scoped display authorization, revoked on drop
pub struct DisplayGrant<'a> {
    access: &'a dyn DisplayAccess,
    released: bool,
}

impl<'a> DisplayGrant<'a> {
    pub fn acquire(access: &'a dyn DisplayAccess) -> Result<Self> {
        access.grant()?;
        debug!("Display access granted");
        Ok(Self {
            access,
            released: false,
        })
    }

    /// Revoke now and report the outcome instead of only logging it
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.access.revoke()?;
        debug!("Display access revoked");
        Ok(())
    }
}

impl Drop for DisplayGrant<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.access.revoke() {
            Ok(()) => debug!("Display access revoked"),
            Err(e) => warn!(error = %e, "Failed to revoke display access"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CtlError;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingAccess {
        grants: Cell<u32>,
        revokes: Cell<u32>,
        fail_grant: bool,
        fail_revoke: bool,
    }

    impl DisplayAccess for CountingAccess {
        fn grant(&self) -> Result<()> {
            if self.fail_grant {
                return Err(CtlError::Display("no X server".to_string()));
            }
            self.grants.set(self.grants.get() + 1);
            Ok(())
        }

        fn revoke(&self) -> Result<()> {
            self.revokes.set(self.revokes.get() + 1);
            if self.fail_revoke {
                return Err(CtlError::Display("revoke failed".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_drop_revokes_once() {
        let access = CountingAccess::default();
        {
            let _grant = DisplayGrant::acquire(&access).unwrap();
            assert_eq!(access.grants.get(), 1);
            assert_eq!(access.revokes.get(), 0);
        }
        assert_eq!(access.revokes.get(), 1);
    }

    #[test]
    fn test_explicit_release_does_not_revoke_twice() {
        let access = CountingAccess::default();
        let grant = DisplayGrant::acquire(&access).unwrap();
        grant.release().unwrap();
        assert_eq!(access.revokes.get(), 1);
    }

    #[test]
    fn test_revoke_on_early_return() {
        fn launch(access: &dyn DisplayAccess) -> Result<()> {
            let _grant = DisplayGrant::acquire(access)?;
            Err(CtlError::Runtime("spawn failed".to_string()))
        }

        let access = CountingAccess::default();
        assert!(launch(&access).is_err());
        assert_eq!(access.revokes.get(), 1);
    }

    #[test]
    fn test_failed_grant_is_not_revoked() {
        let access = CountingAccess {
            fail_grant: true,
            ..Default::default()
        };
        assert!(DisplayGrant::acquire(&access).is_err());
        assert_eq!(access.revokes.get(), 0);
    }

    #[test]
    fn test_failed_release_is_reported_once() {
        let access = CountingAccess {
            fail_revoke: true,
            ..Default::default()
        };
        let grant = DisplayGrant::acquire(&access).unwrap();
        assert!(grant.release().is_err());
        assert_eq!(access.revokes.get(), 1);
    }
}
