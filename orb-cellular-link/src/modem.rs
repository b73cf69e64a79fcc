use crate::context::ConnectionContext;
use derive_more::{Display, From};
use std::sync::Arc;

#[derive(Display, From, Debug, PartialEq, Eq, Hash, Clone)]
#[from(forward)]
pub struct ModemId(String);

/// SIM state as exposed by the modem's SIM manager.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SimStatus {
    pub present: bool,
    pub imsi: Option<String>,
}

/// One modem known to the modem service.
pub trait ModemDevice: Send + Sync {
    fn id(&self) -> ModemId;

    /// `None` while the modem has no usable SIM manager.
    fn sim(&self) -> Option<SimStatus>;

    fn context_by_id(&self, context_id: &str) -> Option<Arc<dyn ConnectionContext>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ModemDirectory: Send + Sync {
    fn modems(&self) -> Vec<Arc<dyn ModemDevice>>;
}

/// Finds the modem with a present SIM whose IMSI is exactly `imsi`.
pub fn find_modem_by_sim_identity(
    directory: &dyn ModemDirectory,
    imsi: &str,
) -> Option<Arc<dyn ModemDevice>> {
    directory.modems().into_iter().find(|modem| {
        modem
            .sim()
            .is_some_and(|sim| sim.present && sim.imsi.as_deref() == Some(imsi))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Modem {
        id: &'static str,
        sim: Option<SimStatus>,
    }

    impl ModemDevice for Modem {
        fn id(&self) -> ModemId {
            ModemId::from(self.id)
        }

        fn sim(&self) -> Option<SimStatus> {
            self.sim.clone()
        }

        fn context_by_id(&self, _: &str) -> Option<Arc<dyn ConnectionContext>> {
            None
        }
    }

    fn sim(present: bool, imsi: Option<&str>) -> Option<SimStatus> {
        Some(SimStatus {
            present,
            imsi: imsi.map(String::from),
        })
    }

    fn modem(id: &'static str, sim: Option<SimStatus>) -> Arc<dyn ModemDevice> {
        Arc::new(Modem { id, sim })
    }

    fn directory() -> MockModemDirectory {
        let mut dir = MockModemDirectory::new();
        dir.expect_modems().returning(|| {
            vec![
                modem("/ril_0", None),
                modem("/ril_1", sim(false, Some("244050000000001"))),
                modem("/ril_2", sim(true, Some("244050000000002"))),
                modem("/ril_3", sim(true, None)),
            ]
        });

        dir
    }

    #[test]
    fn it_finds_modem_with_present_sim() {
        // Arrange
        let dir = directory();

        // Act
        let actual = find_modem_by_sim_identity(&dir, "244050000000002");

        // Assert
        assert_eq!(actual.map(|m| m.id()), Some(ModemId::from("/ril_2")));
    }

    #[test]
    fn it_ignores_absent_sims() {
        let dir = directory();

        assert!(find_modem_by_sim_identity(&dir, "244050000000001").is_none());
    }

    #[test]
    fn it_matches_imsi_exactly() {
        let dir = directory();

        assert!(find_modem_by_sim_identity(&dir, "24405000000000").is_none());
        assert!(find_modem_by_sim_identity(&dir, " 244050000000002").is_none());
        assert!(find_modem_by_sim_identity(&dir, "").is_none());
    }
}
