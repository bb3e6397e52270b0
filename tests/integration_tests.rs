mod common;

use common::{doc, machine_with, ScriptedSession};
use proof_stepper::{Position, ScriptStatus, SessionError, Span};
use std::thread;
use std::time::Duration;

const PROOF: &str = "Lemma plus_0 : forall n, n + 0 = n.
Proof.
  (* by induction *)
  induction n (* on n *) as [| n IH].
  - reflexivity.
  - simpl. rewrite IH. reflexivity.
Qed.
";

#[cfg(test)]
mod stepping_tests {
    use super::*;

    #[test]
    fn test_step_through_whole_proof() {
        let session = ScriptedSession::new();
        let log = session.log_handle();
        let mut machine = machine_with(session);
        let d = doc(PROOF);

        let mut steps = 0;
        loop {
            let report = machine.step(&d).expect("step");
            if report.accepted == 0 {
                break;
            }
            steps += 1;
            assert!(steps <= 10, "stepping did not stop at the end of the script");
        }

        assert_eq!(steps, 10);
        assert_eq!(machine.jump_to_end(), Position::new(6, 4));
        assert_eq!(machine.status(), ScriptStatus::Synced);

        let log = log.lock().unwrap();
        assert_eq!(
            log.sent,
            [
                "Lemma plus_0 : forall n, n + 0 = n.",
                "Proof.",
                "induction n   as [| n IH].",
                "-",
                "reflexivity.",
                "-",
                "simpl.",
                "rewrite IH.",
                "reflexivity.",
                "Qed.",
            ]
        );
    }

    #[test]
    fn test_endpoints_follow_sentence_terminators() {
        let mut machine = machine_with(ScriptedSession::new());
        let d = doc(PROOF);

        machine.to_cursor(&d, Position::new(6, 3)).expect("to_cursor");
        assert_eq!(
            machine.endpoints(),
            [
                Position::new(0, 35),
                Position::new(1, 6),
                Position::new(3, 37),
                Position::new(4, 3),
                Position::new(4, 16),
                Position::new(5, 3),
                Position::new(5, 10),
                Position::new(5, 22),
                Position::new(5, 35),
                Position::new(6, 4),
            ]
        );
    }

    #[test]
    fn test_error_location_skips_comments() {
        // Offsets 22..24 of the stripped sentence are `IH`.
        let session = ScriptedSession::new().reject("IH]", "The variable IH is already bound.", Some((22, 24)));
        let mut machine = machine_with(session);
        let d = doc(PROOF);

        let report = machine.to_cursor(&d, Position::new(6, 3)).expect("to_cursor");
        assert_eq!(report.accepted, 2);

        let failure = report.failure.expect("a rejected sentence");
        assert_eq!(failure.span, Span::new(Position::new(3, 33), Position::new(3, 34)));
        assert_eq!(d.between(failure.span), "IH");
        assert_eq!(machine.status(), ScriptStatus::Error);
        assert_eq!(machine.info_message(), "The variable IH is already bound.");
        assert_eq!(machine.pending().count(), 0);
        assert_eq!(machine.endpoints().len(), 2);
    }

    #[test]
    fn test_to_cursor_then_back_inside_bullets() {
        let mut machine = machine_with(ScriptedSession::new());
        let d = doc(PROOF);

        // Cursor on the dot of `simpl.`
        machine.to_cursor(&d, Position::new(5, 9)).expect("forward");
        assert_eq!(machine.endpoints().len(), 7);
        assert_eq!(machine.jump_to_end(), Position::new(5, 10));

        // Cursor on the dot of the first `reflexivity.`
        let report = machine.to_cursor(&d, Position::new(4, 15)).expect("back");
        assert_eq!(report.rewound, 2);
        assert_eq!(machine.jump_to_end(), Position::new(4, 16));
    }

    #[test]
    fn test_rewind_with_extra_steps() {
        let session = ScriptedSession::new().with_extra_steps(1);
        let log = session.log_handle();
        let mut machine = machine_with(session);
        let d = doc(PROOF);

        machine.to_cursor(&d, Position::new(6, 3)).expect("to_cursor");
        assert_eq!(machine.rewind(1).expect("rewind"), 2);
        assert_eq!(machine.jump_to_end(), Position::new(5, 22));
        assert_eq!(log.lock().unwrap().rewinds, [1]);
    }

    #[test]
    fn test_refused_rewind_keeps_endpoints() {
        let mut machine = machine_with(ScriptedSession::new().refusing_rewind());
        let d = doc("a. b.");

        machine.to_cursor(&d, Position::new(0, 4)).expect("to_cursor");
        assert_eq!(machine.to_top().expect("to_top"), 0);
        assert_eq!(machine.endpoints().len(), 2);
    }

    #[test]
    fn test_broken_session_is_an_error() {
        let mut machine = machine_with(ScriptedSession::new().broken());
        let d = doc("a. b. c.");

        let result = machine.to_cursor(&d, Position::new(0, 7));
        assert!(matches!(result, Err(SessionError::Disconnected)));
        assert_eq!(machine.pending().count(), 0);
        assert!(machine.endpoints().is_empty());
    }

    #[test]
    fn test_interrupt_reaches_running_sentence() {
        let session = ScriptedSession::new();
        let log = session.log_handle();
        let mut machine = machine_with(session);
        let d = doc("auto. hang. auto.");

        let interrupt = machine.interrupt_handle();
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            interrupt.raise();
        });

        let report = machine.to_cursor(&d, Position::new(0, 16)).expect("to_cursor");
        raiser.join().unwrap();

        assert_eq!(report.accepted, 1);
        let failure = report.failure.expect("interrupted sentence");
        assert_eq!(failure.message, "User interrupt.");
        assert_eq!(failure.span, Span::new(Position::new(0, 6), Position::new(0, 10)));

        let log = log.lock().unwrap();
        assert_eq!(log.interrupts, 1);
        assert_eq!(log.sent, ["auto.", "hang."]);
    }

    #[test]
    fn test_query_is_outside_script() {
        let session = ScriptedSession::new();
        let log = session.log_handle();
        let mut machine = machine_with(session);

        let outcome = machine.query("Check (* the type of *) nat.").expect("query");
        assert!(outcome.success);
        assert_eq!(outcome.message, "answer to Check   nat.");
        assert!(machine.endpoints().is_empty());
        assert!(log.lock().unwrap().sent.is_empty());
    }

    #[test]
    fn test_strings_hide_terminators_and_comments() {
        let session = ScriptedSession::new();
        let log = session.log_handle();
        let mut machine = machine_with(session);
        let d = doc(r#"Definition s := "a. (* b". Check s."#);

        machine.step(&d).expect("step");
        assert_eq!(machine.jump_to_end(), Position::new(0, 26));
        machine.step(&d).expect("step");
        assert_eq!(
            log.lock().unwrap().sent,
            [r#"Definition s := "a. (* b"."#, "Check s."]
        );
    }

    #[test]
    fn test_qualified_names_and_ellipsis() {
        let session = ScriptedSession::new();
        let log = session.log_handle();
        let mut machine = machine_with(session);
        let d = doc("apply Nat.add_comm... auto.");

        machine.step(&d).expect("step");
        machine.step(&d).expect("step");
        assert_eq!(log.lock().unwrap().sent, ["apply Nat.add_comm...", "auto."]);
    }

    #[test]
    fn test_unterminated_comment_stops_scanning() {
        let mut machine = machine_with(ScriptedSession::new());
        let d = doc("auto.\n(* never closed\nauto.");

        let report = machine.to_cursor(&d, Position::new(2, 4)).expect("to_cursor");
        assert_eq!(report.accepted, 1);
        assert_eq!(machine.step(&d).expect("step").accepted, 0);
    }
}
