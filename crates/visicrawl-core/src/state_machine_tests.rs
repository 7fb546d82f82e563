
    use super::*;
    use CrawlState::*;

    const ALL: [CrawlState; 8] = [
        Uninitialized,
        Initializing,
        Running,
        PausedManual,
        PausedStep,
        Stopping,
        Stopped,
        Error,
    ];

    fn running() -> CrawlStateMachine {
        let mut sm = CrawlStateMachine::new();
        sm.transition(Initializing).unwrap();
        sm.transition(Running).unwrap();
        sm
    }

    #[test]
    fn test_initial_state() {
        let sm = CrawlStateMachine::new();
        assert_eq!(sm.state(), Uninitialized);
        assert!(sm.history().is_empty());
        assert!(!sm.is_terminal());
    }

    #[test]
    fn test_happy_path() {
        let mut sm = running();
        sm.transition(Stopping).unwrap();
        sm.transition(Stopped).unwrap();
        assert!(sm.is_terminal());
        assert_eq!(sm.history().len(), 4);
        assert_eq!(sm.history()[0].from, Uninitialized);
        assert_eq!(sm.history()[3].to, Stopped);
    }

    #[test]
    fn test_pause_resume_cycles() {
        let mut sm = running();
        sm.transition(PausedManual).unwrap();
        sm.transition(Running).unwrap();
        sm.transition(PausedStep).unwrap();
        sm.transition(Running).unwrap();
        assert_eq!(sm.state(), Running);
    }

    #[test]
    fn test_cannot_switch_pause_kinds_directly() {
        let mut sm = running();
        sm.transition(PausedManual).unwrap();
        let err = sm.transition(PausedStep).unwrap_err();
        assert!(matches!(
            err,
            CrawlError::InvalidTransition {
                from: PausedManual,
                to: PausedStep
            }
        ));
        assert_eq!(sm.state(), PausedManual);
    }

    #[test]
    fn test_cannot_stop_from_pause_directly() {
        let mut sm = running();
        sm.transition(PausedStep).unwrap();
        assert!(sm.transition(Stopping).is_err());
    }

    #[test]
    fn test_rejected_transition_keeps_history() {
        let mut sm = CrawlStateMachine::new();
        assert!(sm.transition(Running).is_err());
        assert_eq!(sm.state(), Uninitialized);
        assert!(sm.history().is_empty());
    }

    #[test]
    fn test_error_reachable_from_every_non_terminal_state() {
        for from in ALL {
            let expected = !matches!(from, Stopped | Error);
            assert_eq!(
                CrawlStateMachine::is_legal(from, Error),
                expected,
                "{} -> error",
                from
            );
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for to in ALL {
            assert!(!CrawlStateMachine::is_legal(Stopped, to), "stopped -> {}", to);
            assert!(!CrawlStateMachine::is_legal(Error, to), "error -> {}", to);
        }
    }

    #[test]
    fn test_legal_table_size() {
        let legal = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| CrawlStateMachine::is_legal(*from, *to))
            .count();
        // 8 table edges plus 6 non-terminal states into Error
        assert_eq!(legal, 14);
    }

    #[test]
    fn test_self_transition_rejected() {
        let mut sm = running();
        assert!(sm.transition(Running).is_err());
    }
